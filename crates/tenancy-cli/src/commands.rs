use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use serde_json::{json, Value};
use tenancy_core::{
    AckWhenClean, BaselineConsumer, BaselineService, CoreConfig, Datastore, Document, ErrorKind,
    ProvisionReport, TenancyService,
};
use tenancy_gate::roles::{SKYLIGHT_ADMIN_ONLY, SKYLIGHT_AND_TENANT_ADMIN};
use tenancy_gate::RoleHeader;
use tenancy_types::{Dashboard, Ref, Tenant, ThresholdProfile};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    let caller = RoleHeader::parse(&cli.role);
    let store = Datastore::in_memory();

    match cli.command {
        Command::Provision(args) => {
            let svc = TenancyService::new(store, &config);
            cmd_provision(&svc, &caller, args, cli.format).await
        }
        Command::Demo(args) => {
            let svc = TenancyService::new(store, &config);
            cmd_demo(&svc, &caller, args, cli.format).await
        }
        Command::Ingest(args) => cmd_ingest(store, &config, args, cli.format).await,
        Command::Config(_) => cmd_config(&config, cli.format),
    }
}

async fn cmd_provision(
    svc: &TenancyService,
    caller: &RoleHeader,
    args: ProvisionArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let subdomain = args.subdomain.unwrap_or_else(|| subdomain_for(&args.name));
    let report = svc
        .provision_tenant(SKYLIGHT_ADMIN_ONLY, caller, Tenant::new(args.name, subdomain))
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report_json(&report))?),
        OutputFormat::Text => print_report(&report),
    }
    match report.error {
        Some(e) => Err(anyhow!(e)),
        None => Ok(()),
    }
}

fn print_report(report: &ProvisionReport) {
    if let Some(tenant) = &report.tenant {
        println!("Tenant {} ({})", tenant.name.bold(), tenant.id().cyan());
    }
    for (step, id) in &report.created {
        println!("  {} {:<32} {}", "✓".green(), step.to_string(), id.dimmed());
    }
    if let (Some(step), Some(err)) = (report.failed_step, &report.error) {
        println!("  {} {:<32} {}", "✗".red().bold(), step.to_string(), err.to_string().red());
        if report.compensated {
            println!("  {} completed steps rolled back", "↺".yellow());
        }
    } else {
        println!("{} Tenant provisioned", "✓".green().bold());
    }
}

fn report_json(report: &ProvisionReport) -> Value {
    json!({
        "tenant": report.tenant,
        "completedSteps": report.completed_steps,
        "created": report
            .created
            .iter()
            .map(|(step, id)| json!({"step": step, "id": id}))
            .collect::<Vec<_>>(),
        "failedStep": report.failed_step,
        "error": report.error.as_ref().map(|e| json!({
            "kind": e.kind().to_string(),
            "status": e.kind().status_hint(),
            "message": e.to_string(),
        })),
        "compensated": report.compensated,
    })
}

fn subdomain_for(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

// ---------------------------------------------------------------------------
// demo
// ---------------------------------------------------------------------------

/// Collects walkthrough steps; text output prints as it goes.
struct Walkthrough {
    format: OutputFormat,
    steps: Vec<Value>,
}

impl Walkthrough {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            steps: Vec::new(),
        }
    }

    fn step(&mut self, label: &str, outcome: &str, detail: impl Into<String>) {
        let detail = detail.into();
        if self.format == OutputFormat::Text {
            println!("{} {:<44} {} {}", "→".blue(), label, outcome.green(), detail.dimmed());
        }
        self.steps
            .push(json!({"step": label, "outcome": outcome, "detail": detail}));
    }

    fn finish(self) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&json!({"steps": self.steps}))?)
            }
            OutputFormat::Text => println!("{} Walkthrough complete", "✓".green().bold()),
        }
        Ok(())
    }
}

async fn cmd_demo(
    svc: &TenancyService,
    caller: &RoleHeader,
    args: DemoArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut out = Walkthrough::new(format);
    let allowed = SKYLIGHT_AND_TENANT_ADMIN;

    let tenant = svc
        .provision_tenant(
            SKYLIGHT_ADMIN_ONLY,
            caller,
            Tenant::new(args.tenant.clone(), subdomain_for(&args.tenant)),
        )
        .await?
        .into_result()?;
    let owner = tenant.owner_id();
    out.step("provision tenant", "ok", format!("{} {}", tenant.name, tenant.id()));

    let profiles = svc.list::<ThresholdProfile>(allowed, caller, &owner).await?;
    let [profile] = profiles.as_slice() else {
        bail!("expected exactly one threshold profile, found {}", profiles.len());
    };
    out.step("default threshold profile", "ok", format!("{} {}", profile.name, profile.id()));

    let dashboard = svc
        .create(allowed, caller, Dashboard::new(owner.clone(), "Overview", Ref::new(profile.id())))
        .await?;
    out.step("create dashboard", "ok", dashboard.id());

    let patched: Dashboard = svc
        .patch(allowed, caller, &owner, dashboard.id(), br#"{"category":"network"}"#)
        .await?;
    out.step(
        "patch dashboard category",
        "ok",
        format!("rev {} -> {}", dashboard.rev(), patched.rev()),
    );

    match svc
        .delete::<ThresholdProfile>(allowed, caller, &owner, profile.id())
        .await
    {
        Err(e) if e.kind() == ErrorKind::IntegrityViolation => {
            out.step("delete profile while referenced", "refused", e.to_string());
        }
        Err(e) => return Err(e).context("unexpected failure deleting referenced profile"),
        Ok(_) => bail!("referenced threshold profile was deleted"),
    }

    svc.delete::<Dashboard>(allowed, caller, &owner, dashboard.id())
        .await?;
    out.step("delete dashboard", "ok", dashboard.id());

    let removed = svc
        .delete::<ThresholdProfile>(allowed, caller, &owner, profile.id())
        .await?;
    if &removed != profile {
        bail!("deleted profile differs from the one created at provisioning");
    }
    out.step("delete profile", "ok", removed.id());

    out.finish()
}

// ---------------------------------------------------------------------------
// ingest
// ---------------------------------------------------------------------------

async fn cmd_ingest(
    store: Datastore,
    config: &CoreConfig,
    args: IngestArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let consumer = if args.strict {
        let ingestor = BaselineService::new(store.baselines(), config.store.timeout());
        BaselineConsumer::with_policy(Arc::new(ingestor), Arc::new(AckWhenClean))
    } else {
        TenancyService::new(store, config).baseline_consumer()
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut received, mut acked) = (0usize, 0usize);
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        received += 1;
        let ack = consumer.handle_incoming_baseline(line.as_bytes()).await;
        if ack {
            acked += 1;
        }
        if format == OutputFormat::Text {
            let mark = if ack { "ack".green() } else { "nack".red() };
            println!("message {received}: {mark}");
        }
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({"received": received, "acked": acked}))?
        ),
        OutputFormat::Text => println!(
            "{} {} messages, {} acknowledged",
            "✓".green().bold(),
            received,
            acked
        ),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config(config: &CoreConfig, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}
