use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use warden_policy::EffectiveGrant;

use super::{Context, subject_for};
use crate::cli::ExplainArgs;
use crate::output::{print_grants, print_json};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Explanation {
    groups: Vec<String>,
    generation: u64,
    grants: Vec<EffectiveGrant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    visible_databases: Option<Vec<String>>,
}

pub async fn run(ctx: &Context, args: &ExplainArgs) -> Result<()> {
    let service = ctx.open_service().await?;
    let snapshot = service.snapshot();
    let subject = subject_for(&snapshot, &args.groups, args.user.as_deref())?;

    let explanation = Explanation {
        groups: subject.groups().iter().cloned().collect(),
        generation: snapshot.generation,
        grants: snapshot.engine.effective_permissions(&subject),
        visible_databases: (!args.databases.is_empty())
            .then(|| snapshot.engine.visible_databases(&subject, &args.databases)),
    };

    if ctx.is_json() {
        return print_json(&explanation);
    }

    println!("{}: {}", "Groups".cyan(), explanation.groups.join(", "));
    print_grants(&explanation.grants);
    if let Some(visible) = &explanation.visible_databases {
        let shown = if visible.is_empty() {
            "(none)".to_string()
        } else {
            visible.join(", ")
        };
        println!("{}: {}", "Visible databases".cyan(), shown);
    }
    for (database, reason) in snapshot.view.unavailable_databases() {
        println!(
            "{} database {} has no loaded policy: {}",
            "!".yellow(),
            database,
            reason
        );
    }
    Ok(())
}
