use anyhow::{Context as _, Result, anyhow, bail};
use warden_core::{Action, ObjectPath, Resource, ResourceRequest};
use warden_policy::{Decision, OperationKind, OperationRequest};

use super::{Context, subject_for};
use crate::cli::CheckArgs;
use crate::output::{print_decision, print_json};

/// Parse `db.table` into a table path on `server`.
fn parse_table(server: &str, raw: &str) -> Result<ObjectPath> {
    match raw.split_once('.') {
        Some((db, table)) if !db.trim().is_empty() && !table.trim().is_empty() => {
            Ok(ObjectPath::for_table(server, db.trim(), table.trim()))
        }
        _ => bail!("Expected db.table, got `{raw}`"),
    }
}

fn resource_request(resource: &str, action: Action) -> Result<ResourceRequest> {
    let resource: Resource = resource
        .parse()
        .with_context(|| format!("Invalid resource `{resource}`"))?;
    Ok(match resource {
        Resource::Object(path) => ResourceRequest::object(path, action),
        Resource::Uri { server, uri } => ResourceRequest::uri(server, uri),
    })
}

fn operation_request(server: &str, kind: &str, args: &CheckArgs) -> Result<OperationRequest> {
    let kind: OperationKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let mut request = OperationRequest::new(kind);
    if let Some(database) = &args.database {
        request = request.with_database(database.as_str());
    }
    for input in &args.inputs {
        request = request.with_input(parse_table(server, input)?);
    }
    for output in &args.outputs {
        request = request.with_output(parse_table(server, output)?);
    }
    for uri in &args.input_uris {
        request = request.with_input_uri(uri.as_str());
    }
    for uri in &args.output_uris {
        request = request.with_output_uri(uri.as_str());
    }
    Ok(request)
}

/// Returns the decision so the caller can pick the exit code.
pub async fn run(ctx: &Context, args: &CheckArgs) -> Result<Decision> {
    let service = ctx.open_service().await?;
    let subject = subject_for(&service.snapshot(), &args.groups, args.user.as_deref())?;
    let server = ctx.config.policy.server.as_str();

    let decision = match (&args.operation, &args.resource) {
        (Some(kind), _) => {
            let request = operation_request(server, kind, args)?;
            service.authorize_operation(&subject, &request)
        }
        (None, Some(resource)) => {
            let action: Action = args
                .action
                .parse()
                .with_context(|| format!("Invalid action `{}`", args.action))?;
            let request = resource_request(resource, action)?;
            service.authorize(&subject, &request)
        }
        (None, None) => bail!("Give either a resource or --operation"),
    };

    if ctx.is_json() {
        print_json(&decision)?;
    } else {
        print_decision(&decision);
    }
    Ok(decision)
}
