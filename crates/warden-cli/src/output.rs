use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;
use warden_policy::{Decision, EffectiveGrant};

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_decision(decision: &Decision) {
    match decision {
        Decision::Allow => println!("{}", "ALLOW".green().bold()),
        Decision::Deny(reason) => {
            println!("{} ({})", "DENY".red().bold(), reason.code);
            println!("  {}", reason.message);
        }
    }
}

pub fn print_grants(grants: &[EffectiveGrant]) {
    if grants.is_empty() {
        println!("No privileges.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Role", "Source", "Path", "Action"]);
    for effective in grants {
        builder.push_record([
            effective.role.clone(),
            effective.source.to_string(),
            effective.grant.path.to_string(),
            effective.grant.action.to_string(),
        ]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

pub fn print_table<const N: usize>(header: [&str; N], rows: Vec<[String; N]>) {
    let mut builder = Builder::default();
    builder.push_record(header);
    for row in rows {
        builder.push_record(row);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}
