use anyhow::{Context, Result};
use pin_raider::{
    diff, lint, lint_sources, load_manifest, load_tree, parse_manifest, report, serialization,
    BsonDirStore, LintConfig, Manifest, ManifestSummary, RenderMode, SnapshotStore,
};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cli::{
    CheckArgs, DiffArgs, ExportArgs, ExportFormat, FmtArgs, ListArgs, OutputFormat,
    SnapshotArgs, SnapshotCommands,
};

/// Handlers return `Ok(false)` when the command ran but the input did not pass.
pub type Passed = bool;

#[derive(Serialize)]
struct Listing<'a> {
    summary: ManifestSummary,
    manifest: &'a Manifest,
}

pub async fn check(args: &CheckArgs) -> Result<Passed> {
    let mut config = LintConfig::load(args.config.as_deref())?;
    if args.allow_unpinned {
        config.allow_unpinned = true;
    }
    if args.deny_duplicates {
        config.deny_duplicates = true;
    }
    if let Some(fail_on) = args.fail_on {
        config.fail_on = fail_on;
    }
    debug!("Lint config: {:?}", config);

    let findings = if args.follow_includes {
        let sources = load_tree(&args.file).await?;
        info!("Loaded {} file(s) from {}", sources.len(), args.file.display());
        lint_sources(&sources, &config)
    } else {
        lint(&load_manifest(&args.file).await?, &config)
    };

    match args.format {
        OutputFormat::Text => print!("{}", report::render_findings(&findings)),
        OutputFormat::Json => println!("{}", serialization::to_json(&findings)?),
    }

    Ok(!findings.exceeds(config.fail_on))
}

pub async fn fmt(args: &FmtArgs) -> Result<Passed> {
    let original = fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let manifest = parse_manifest(&original)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;
    let mode = if args.normalize {
        RenderMode::Normalize
    } else {
        RenderMode::Preserve
    };
    let rendered = manifest.render(mode);

    if args.check {
        if rendered != original {
            warn!("{} is not formatted", args.file.display());
            return Ok(false);
        }
        return Ok(true);
    }

    if args.write {
        if rendered == original {
            debug!("{} already formatted", args.file.display());
        } else {
            fs::write(&args.file, &rendered)
                .await
                .with_context(|| format!("Failed to write {}", args.file.display()))?;
            info!("Rewrote {}", args.file.display());
        }
        return Ok(true);
    }

    print!("{rendered}");
    Ok(true)
}

pub async fn list(args: &ListArgs) -> Result<Passed> {
    let manifest = load_manifest(&args.file).await?;
    let summary = manifest.summary();

    match args.format {
        OutputFormat::Text => {
            print!("{}", report::render_summary(&summary));
            println!();
            print!("{}", report::render_entries(&manifest));
        }
        OutputFormat::Json => {
            let listing = Listing {
                summary,
                manifest: &manifest,
            };
            println!("{}", serialization::to_json(&listing)?);
        }
    }
    Ok(true)
}

pub async fn export(args: &ExportArgs) -> Result<Passed> {
    let manifest = load_manifest(&args.file).await?;

    let bytes = match args.format {
        ExportFormat::Json => serialization::to_json(&manifest)?.into_bytes(),
        ExportFormat::Bson => serialization::serialize_to_bson(&manifest)?,
    };
    serialization::save_to_binary_file(&args.output, &bytes).await?;

    info!(
        "Exported {} line(s) to {} ({} bytes)",
        manifest.lines.len(),
        args.output.display(),
        bytes.len()
    );
    Ok(true)
}

pub async fn diff_files(args: &DiffArgs) -> Result<Passed> {
    let old = load_manifest(&args.old).await?;
    let new = load_manifest(&args.new).await?;
    print_diff(&old, &new, args.format)?;
    Ok(true)
}

pub async fn snapshot(args: &SnapshotArgs) -> Result<Passed> {
    let store = BsonDirStore::try_new(&args.store).await?;
    store.health_check().await?;
    debug!("Using {} store at {}", store.get_name(), store.root().display());

    match &args.command {
        SnapshotCommands::Save(save) => {
            let manifest = load_manifest(&save.file).await?;
            store.insert(&save.name, &manifest).await?;
            info!("Saved {} as snapshot {}", save.file.display(), save.name);
        }
        SnapshotCommands::Show(show) => {
            let manifest = store.get(&show.name).await?;
            print!("{}", manifest.render(RenderMode::Preserve));
        }
        SnapshotCommands::Diff(diff_args) => {
            let old = store.get(&diff_args.name).await?;
            let new = load_manifest(&diff_args.file).await?;
            print_diff(&old, &new, diff_args.format)?;
        }
        SnapshotCommands::List => {
            for name in store.list().await? {
                println!("{name}");
            }
        }
    }
    Ok(true)
}

fn print_diff(old: &Manifest, new: &Manifest, format: OutputFormat) -> Result<()> {
    let changes = diff(old, new);
    match format {
        OutputFormat::Text => print!("{}", report::render_diff(&changes)),
        OutputFormat::Json => println!("{}", serialization::to_json(&changes)?),
    }
    Ok(())
}
