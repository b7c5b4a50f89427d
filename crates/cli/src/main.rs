use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dentachart_catalog::{ProcedureCategory, ToothRegistry};
use dentachart_core::constants::DEFAULT_DRAFT_BUDGET_TITLE;
use dentachart_core::{
    diff, extract, resolve_data_dir, summarise, ApplyOutcome, BudgetItemId, ChartDocument,
    CoreConfig, EditingMode, FileStore, FindingChange, FindingKey, PatientId, PendingService,
    PlanId, PlanSync, SaveTreatmentPlan, SnapshotId, Surface, Target, Tool, ToolEngine,
    ToothNumber,
};
use dentachart_types::Dentition;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dentachart")]
#[command(about = "Dental odontogram charting and treatment plans")]
struct Cli {
    /// Directory holding plan items, budgets and plans
    #[arg(long, global = true, env = "DENTACHART_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalog procedures
    Catalog {
        /// Only this category (lesion, restoration, endodontic, ...)
        #[arg(long)]
        category: Option<ProcedureCategory>,
    },
    /// List tooth definitions
    Teeth {
        /// permanent or temporary
        #[arg(long)]
        dentition: Option<String>,
    },
    /// Apply a tool to a chart file, creating it if missing
    Apply {
        /// Chart document (YAML)
        #[arg(long)]
        chart: PathBuf,
        /// Procedure id, eraser or cure
        #[arg(long)]
        tool: String,
        /// FDI tooth number
        #[arg(long)]
        tooth: u8,
        #[arg(long)]
        surface: Option<Surface>,
        /// Treat the chart as an evolution chart (needed for cure)
        #[arg(long)]
        evolution: bool,
    },
    /// Print the findings of a chart
    Findings {
        #[arg(long)]
        chart: PathBuf,
    },
    /// Compare a baseline chart with an evolution chart
    Diff {
        #[arg(long)]
        baseline: PathBuf,
        #[arg(long)]
        evolution: PathBuf,
    },
    /// Make sure every finding of a chart has a plan item
    Sync {
        #[arg(long)]
        patient: PatientId,
        #[arg(long)]
        chart: PathBuf,
        /// Snapshot id recorded on newly created items
        #[arg(long)]
        snapshot: Option<String>,
    },
    /// Save a treatment plan with its budget
    SavePlan {
        #[arg(long)]
        patient: PatientId,
        #[arg(long)]
        chart: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// FINDING_KEY=SERVICE_ID[:QTY], e.g. "16|caries|occlusal=resina_simple"
        #[arg(long = "service")]
        services: Vec<String>,
    },
    /// List a patient's plan items and their services
    PlanItems {
        #[arg(long)]
        patient: PatientId,
    },
    /// Apply a tool to a saved plan's evolution chart
    Evolve {
        /// Treatment plan id
        #[arg(long)]
        plan: String,
        #[arg(long)]
        tool: String,
        #[arg(long)]
        tooth: u8,
        #[arg(long)]
        surface: Option<Surface>,
    },
    /// Remove a service from its finding
    RemoveService {
        /// Budget item id
        #[arg(long)]
        budget_item: String,
    },
}

fn read_chart(path: &Path) -> anyhow::Result<ChartDocument> {
    if !path.exists() {
        return Ok(ChartDocument::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read chart {}", path.display()))?;
    Ok(ChartDocument::from_yaml(&text)?)
}

fn write_chart(path: &Path, chart: &ChartDocument) -> anyhow::Result<()> {
    std::fs::write(path, chart.to_yaml()?)
        .with_context(|| format!("failed to write chart {}", path.display()))
}

fn target(tooth: u8, surface: Option<Surface>) -> anyhow::Result<Target> {
    let tooth = ToothNumber::new(tooth)?;
    Ok(match surface {
        Some(surface) => Target::surface(tooth, surface),
        None => Target::tooth(tooth),
    })
}

fn resolve_tool(engine: &ToolEngine, name: &str) -> anyhow::Result<Tool> {
    match Tool::resolve(engine.catalog(), name) {
        Some(tool) => Ok(tool),
        None => bail!("unknown tool '{name}'"),
    }
}

/// Parses `FINDING_KEY=SERVICE_ID[:QTY]`. The key itself contains `|` separators.
fn parse_service(raw: &str) -> anyhow::Result<PendingService> {
    let Some((key, service)) = raw.rsplit_once('=') else {
        bail!("service assignment '{raw}' must look like KEY=SERVICE[:QTY]");
    };
    let (service_id, quantity) = match service.split_once(':') {
        Some((id, qty)) => (id, qty.parse::<u32>().with_context(|| format!("bad quantity in '{raw}'"))?),
        None => (service, 1),
    };
    Ok(PendingService {
        finding: key.parse::<FindingKey>()?,
        service_id: service_id.to_owned(),
        quantity,
    })
}

fn describe(outcome: &ApplyOutcome) -> String {
    match outcome {
        ApplyOutcome::Changed => "changed".into(),
        ApplyOutcome::Unchanged { reason } => format!("unchanged ({reason:?})"),
        ApplyOutcome::Cured(report) if report.changed() => format!(
            "cured ({} tooth-level findings recoloured)",
            report.recoloured_findings
        ),
        ApplyOutcome::Cured(report) => format!("nothing cured ({:?})", report.surface_cure),
    }
}

fn plan_sync(data_dir: Option<PathBuf>) -> anyhow::Result<PlanSync> {
    let data_dir = resolve_data_dir(data_dir)?;
    let title = std::env::var("DENTACHART_BUDGET_TITLE")
        .unwrap_or_else(|_| DEFAULT_DRAFT_BUDGET_TITLE.into());
    let cfg = Arc::new(CoreConfig::new(data_dir, title)?);
    let store = Arc::new(FileStore::new(&cfg));
    Ok(PlanSync::with_store(cfg, store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let engine = ToolEngine::default();

    match cli.command {
        Some(Commands::Catalog { category }) => {
            let catalog = engine.catalog();
            let procedures: Vec<_> = match category {
                Some(category) => catalog.by_category(category).collect(),
                None => catalog.all().iter().collect(),
            };
            for p in procedures {
                println!(
                    "{:<24} {:<28} {:<6} {:?} {:?}",
                    p.id,
                    p.name,
                    p.color.as_str(),
                    p.application_type,
                    p.category
                );
            }
        }
        Some(Commands::Teeth { dentition }) => {
            let registry = ToothRegistry::new();
            let dentition = match dentition.as_deref() {
                None => None,
                Some("permanent") => Some(Dentition::Permanent),
                Some("temporary") => Some(Dentition::Temporary),
                Some(other) => bail!("dentition must be 'permanent' or 'temporary', got '{other}'"),
            };
            let teeth: Vec<_> = match dentition {
                Some(d) => registry.by_dentition(d).collect(),
                None => registry.all().iter().collect(),
            };
            for t in teeth {
                println!(
                    "{} {:?} {:?} {:?} roots={}",
                    t.number, t.arch, t.dentition, t.class, t.root_count
                );
            }
        }
        Some(Commands::Apply {
            chart,
            tool,
            tooth,
            surface,
            evolution,
        }) => {
            let document = read_chart(&chart)?;
            let tool = resolve_tool(&engine, &tool)?;
            let mode = if evolution {
                EditingMode::Evolution
            } else {
                EditingMode::Baseline
            };
            let applied = engine.apply(&document, tool, target(tooth, surface)?, mode);
            if applied.outcome.is_change() {
                write_chart(&chart, &applied.chart)?;
            }
            println!("{tool} on tooth {tooth}: {}", describe(&applied.outcome));
        }
        Some(Commands::Findings { chart }) => {
            let findings = extract(&read_chart(&chart)?);
            for f in &findings {
                println!("{}  {}", f.key(), f.color);
            }
            let summary = summarise(&findings);
            println!(
                "{} findings: {} pathological, {} treated, {} alert, {} other",
                summary.total(),
                summary.pathological,
                summary.treated,
                summary.alert,
                summary.other
            );
        }
        Some(Commands::Diff {
            baseline,
            evolution,
        }) => {
            let changes = diff(&read_chart(&baseline)?, &read_chart(&evolution)?);
            for change in &changes.changes {
                match change {
                    FindingChange::Added { finding } => println!("+ {}", finding.key()),
                    FindingChange::Removed { finding } => println!("- {}", finding.key()),
                    FindingChange::Recoloured { finding, from } => {
                        println!("~ {} {} -> {}", finding.key(), from, finding.color)
                    }
                    FindingChange::Remapped { from, to } => {
                        println!("~ {} -> {}", from.key(), to.key())
                    }
                }
            }
            println!("{} changes, {} cured", changes.changes.len(), changes.cured_count());
        }
        Some(Commands::Sync {
            patient,
            chart,
            snapshot,
        }) => {
            let sync = plan_sync(cli.data_dir)?;
            let snapshot: Option<SnapshotId> = snapshot.map(|s| s.parse()).transpose()?;
            let synced = sync
                .sync_from_odontogram(patient, snapshot, &read_chart(&chart)?)
                .await?;
            for (key, item) in synced.keys().zip(synced.items()) {
                println!("{}  {key}", item.id);
            }
            println!("{} items, {} created", synced.len(), synced.created());
        }
        Some(Commands::SavePlan {
            patient,
            chart,
            title,
            notes,
            services,
        }) => {
            let services = services
                .iter()
                .map(|raw| parse_service(raw))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let sync = plan_sync(cli.data_dir)?;
            let saved = sync
                .save_treatment_plan(SaveTreatmentPlan {
                    patient_id: patient,
                    snapshot_id: None,
                    title,
                    notes,
                    chart: read_chart(&chart)?,
                    services,
                })
                .await?;
            println!("Saved treatment plan {}", saved.plan.id);
            println!(
                "Budget {} ({}): {} items, total {}.{:02}",
                saved.budget.id,
                saved.budget.status,
                saved.budget.items.len(),
                saved.budget.total_cents() / 100,
                saved.budget.total_cents() % 100
            );
            for dropped in &saved.dropped {
                eprintln!(
                    "Dropped service {} for {} ({:?})",
                    dropped.service_id, dropped.finding, dropped.reason
                );
            }
        }
        Some(Commands::PlanItems { patient }) => {
            let sync = plan_sync(cli.data_dir)?;
            let items = sync.plan_items(patient).await?;
            if items.is_empty() {
                println!("No plan items found.");
            }
            for item in items {
                println!("{}  {}", item.id, item.key());
                for service in &item.budget_items {
                    println!(
                        "    {} {} x{} ({})",
                        service.service_id, service.service_name, service.quantity, service.id
                    );
                }
            }
        }
        Some(Commands::Evolve {
            plan,
            tool,
            tooth,
            surface,
        }) => {
            let sync = plan_sync(cli.data_dir)?;
            let plan_id: PlanId = plan.parse()?;
            let mut session = sync.open_evolution(plan_id).await?;
            let tool = resolve_tool(&engine, &tool)?;
            let outcome = session.apply(tool, target(tooth, surface)?);
            println!("{tool} on tooth {tooth}: {}", describe(&outcome));
            if session.is_dirty() {
                let cured = session.diff().cured_count();
                sync.update_evolution(plan_id, session.into_chart()).await?;
                println!("Evolution saved; {cured} findings cured against the baseline");
            }
        }
        Some(Commands::RemoveService { budget_item }) => {
            let sync = plan_sync(cli.data_dir)?;
            sync.remove_service_from_finding(budget_item.parse::<BudgetItemId>()?)
                .await?;
            println!("Removed budget item {budget_item}");
        }
        None => {
            println!("Use 'dentachart --help' for commands");
        }
    }

    Ok(())
}
