//! `growrec` - CLI for growthrecorder
//!
//! This binary walks an operator through a measurement and gives access to the
//! saved history.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::Parser;

use growthrecorder::cli::{
    Cli, Command, ConfigCommand, HistoryCommand, MeasureCommand, OutputFormat, QrCommand,
    ShowCommand,
};
use growthrecorder::history::{format_height, format_weight, render_record, HistoryView, SuccessView};
use growthrecorder::identity::{FormField, IdentityForm};
use growthrecorder::workflow::{FetchTicket, MeasurementWorkflow, Notice, NoticeLevel};
use growthrecorder::{
    init_logging, Config, Error, LocalStore, QrEncoder, RestTableSink, Storage,
    TelemetryReadingProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Some(Command::Measure(cmd)) => handle_measure(&config, &cmd).await,
        Some(Command::History(cmd)) => handle_history(&config, &cmd),
        Some(Command::Show(cmd)) => handle_show(&config, &cmd),
        Some(Command::Qr(cmd)) => handle_qr(&config, &cmd),
        Some(Command::Status(cmd)) => handle_status(&config, cmd.json),
        Some(Command::Config(cmd)) => handle_config(&config, cmd),
        None => {
            // Returning operators land on their history; first runs go
            // straight to a measurement.
            if open_store(&config)?.count()? > 0 {
                let cmd = HistoryCommand {
                    format: OutputFormat::Plain,
                    limit: None,
                };
                handle_history(&config, &cmd)
            } else {
                handle_measure(&config, &MeasureCommand::default()).await
            }
        }
    }
}

fn open_store(config: &Config) -> anyhow::Result<LocalStore> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("opening measurement store at {}", path.display()))?;
    Ok(LocalStore::new(storage, &config.storage))
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        bail!("input closed");
    }
    Ok(line.trim().to_string())
}

fn ask_yes_no(question: &str) -> anyhow::Result<bool> {
    let answer = prompt(&format!("{question} [y/N]"))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
        };
        eprintln!("[{tag}] {}: {}", notice.title, notice.message);
    }
}

/// Fill the identity form from flags and prompts until the workflow accepts it.
fn collect_identity(
    cmd: &MeasureCommand,
    workflow: &mut MeasurementWorkflow,
    today: NaiveDate,
    interactive: bool,
) -> anyhow::Result<FetchTicket> {
    let mut form = IdentityForm::new();
    form.name = cmd.name.clone().unwrap_or_default();
    form.parent_name = cmd.parent_name.clone().unwrap_or_default();
    if let Some(dob) = &cmd.dob {
        form.set_dob_text(dob, today);
    }

    if !interactive {
        let missing: Vec<&str> = [
            ("--name", cmd.name.is_none()),
            ("--parent-name", cmd.parent_name.is_none()),
            ("--dob", cmd.dob.is_none()),
        ]
        .into_iter()
        .filter_map(|(flag, missing)| missing.then_some(flag))
        .collect();
        if !missing.is_empty() {
            bail!("stdin is not a terminal; pass {}", missing.join(", "));
        }
    }

    if cmd.name.is_none() {
        form.name = prompt("Name")?;
    }
    if cmd.parent_name.is_none() {
        form.parent_name = prompt("Parent name")?;
    }
    if cmd.dob.is_none() {
        let text = prompt("Date of birth (YYYY-MM-DD)")?;
        form.set_dob_text(&text, today);
    }

    loop {
        let errors = match workflow.submit_form(&form, today) {
            Ok(ticket) => {
                if let Some(age) = form.age(today) {
                    println!("Age: {age}");
                }
                return Ok(ticket);
            }
            Err(Error::Validation(errors)) if interactive => errors,
            Err(e) => return Err(e.into()),
        };

        for error in errors.errors() {
            eprintln!("  {}: {}", error.field, error.message);
        }
        if errors.for_field(FormField::Name).is_some() {
            form.name = prompt("Name")?;
        }
        if errors.for_field(FormField::ParentName).is_some() {
            form.parent_name = prompt("Parent name")?;
        }
        if errors.for_field(FormField::DateOfBirth).is_some()
            || errors.for_field(FormField::Age).is_some()
        {
            let text = prompt("Date of birth (YYYY-MM-DD)")?;
            if !form.set_dob_text(&text, today) {
                eprintln!("  Enter a past date as YYYY-MM-DD.");
            }
        }
    }
}

async fn read_into(workflow: &mut MeasurementWorkflow, ticket: FetchTicket) {
    println!("Fetching readings...");
    let sample = workflow.fetch_readings(ticket).await;
    workflow.apply_readings(ticket, sample);
    print_notices(workflow.take_notices());
}

enum Action {
    Confirm,
    Refetch,
    Cancel,
}

fn choose_action() -> anyhow::Result<Action> {
    loop {
        let choice = prompt("[c]onfirm, [r]e-fetch or [x] cancel")?;
        match choice.to_ascii_lowercase().as_str() {
            "c" | "confirm" => return Ok(Action::Confirm),
            "r" | "refetch" | "re-fetch" => return Ok(Action::Refetch),
            "x" | "cancel" => return Ok(Action::Cancel),
            _ => eprintln!("  Choose c, r or x."),
        }
    }
}

async fn handle_measure(config: &Config, cmd: &MeasureCommand) -> anyhow::Result<()> {
    let interactive = io::stdin().is_terminal();
    let today = Local::now().date_naive();

    let store = open_store(config)?;
    let provider = TelemetryReadingProvider::new(config.telemetry.clone())?;
    let mut workflow = MeasurementWorkflow::new(Arc::new(provider), store)
        .with_qr_encoder(QrEncoder::new(config.qr.clone()))
        .with_identity_rules(config.identity.clone());
    if !cmd.no_remote {
        if let Some(sink) = RestTableSink::from_config(&config.sink)? {
            workflow = workflow.with_sink(Arc::new(sink));
        }
    }

    let ticket = collect_identity(cmd, &mut workflow, today, interactive)?;
    read_into(&mut workflow, ticket).await;

    loop {
        if let Some(sample) = workflow.sample() {
            println!(
                "Weight: {}    Height: {}",
                format_weight(sample.weight_kg),
                format_height(sample.height_cm)
            );
        }

        let action = if cmd.yes {
            Action::Confirm
        } else if interactive {
            choose_action()?
        } else {
            bail!("stdin is not a terminal; pass --yes to save the readings");
        };

        match action {
            Action::Confirm => {
                let both_zero = workflow.sample().is_some_and(|s| s.is_empty());
                let accept_zero = cmd.accept_zero
                    || (both_zero
                        && !cmd.yes
                        && ask_yes_no("Both readings are zero. Save anyway?")?);

                match workflow.confirm(accept_zero) {
                    Ok(saved) => {
                        print!("{}", SuccessView::new(saved).render());
                        if let (Some(path), Some(qr)) = (&cmd.qr_out, &saved.qr) {
                            std::fs::write(path, &qr.svg)
                                .with_context(|| format!("writing {}", path.display()))?;
                            println!("QR code written to {}", path.display());
                        }
                        break;
                    }
                    Err(e @ (Error::ConfirmBlocked { .. } | Error::LocalPersist { .. }))
                        if !cmd.yes =>
                    {
                        eprintln!("{e}");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Action::Refetch => {
                let ticket = workflow.begin_refetch()?;
                read_into(&mut workflow, ticket).await;
            }
            Action::Cancel => {
                workflow.cancel()?;
                println!("Measurement cancelled.");
                return Ok(());
            }
        }
    }

    print_notices(workflow.take_notices());
    let pending = workflow.pending_mirrors();
    if pending > 0 {
        let synced = workflow.drain_mirrors(config.sink_timeout()).await;
        if synced == pending {
            println!("Copied to remote table '{}'.", config.sink.table_name);
        }
        print_notices(workflow.take_notices());
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    let records = open_store(config)?.list_all()?;
    let skip = cmd
        .limit
        .map_or(0, |limit| records.len().saturating_sub(limit));
    let view = HistoryView::new(&records[skip..]);
    print!("{}", view.render(cmd.format.into())?);
    if cmd.format == OutputFormat::Json {
        println!();
    }
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let Some(record) = open_store(config)?.find_by_id(&cmd.id)? else {
        bail!("no measurement with id {}", cmd.id);
    };
    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Plain | OutputFormat::Table => print!("{}", render_record(&record)),
    }
    Ok(())
}

fn handle_qr(config: &Config, cmd: &QrCommand) -> anyhow::Result<()> {
    let Some(record) = open_store(config)?.find_by_id(&cmd.id)? else {
        bail!("no measurement with id {}", cmd.id);
    };
    let image = QrEncoder::new(config.qr.clone())
        .encode(&record.qr_payload())
        .context("encoding QR code")?;

    match &cmd.out {
        Some(path) => {
            std::fs::write(path, &image.svg)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("QR code written to {}", path.display());
        }
        None => println!("{}", image.text),
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let records = store.count()?;
    let stats = store.storage().stats()?;
    let sink_active = config.sink.is_active();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "storage_key": store.key(),
            "records": records,
            "last_updated": stats.last_updated,
            "db_size_bytes": stats.db_size_bytes,
            "telemetry": {
                "base_url": config.telemetry.base_url,
                "channel_id": config.telemetry.channel_id,
            },
            "remote_sink": {
                "active": sink_active,
                "table": config.sink.table_name,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("growrec status");
        println!("--------------");
        println!("Database:      {}", config.database_path().display());
        println!("Storage key:   {}", store.key());
        println!("Measurements:  {records}");
        if let Some(updated) = stats.last_updated {
            println!(
                "Last saved:    {}",
                updated.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            );
        }
        println!(
            "Telemetry:     {} (channel {})",
            config.telemetry.base_url, config.telemetry.channel_id
        );
        if sink_active {
            println!("Remote table:  {}", config.sink.table_name);
        } else {
            println!("Remote table:  disabled");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Key:                {}", config.storage.key);
                println!();
                println!("[Telemetry]");
                println!("  Base URL:           {}", config.telemetry.base_url);
                println!("  Channel:            {}", config.telemetry.channel_id);
                println!(
                    "  Fields:             weight={} height={} infant_height={}",
                    config.telemetry.fields.weight,
                    config.telemetry.fields.height,
                    config.telemetry.fields.infant_height
                );
                println!(
                    "  Timeout:            {}s",
                    config.telemetry_timeout().as_secs()
                );
                println!();
                println!("[Sink]");
                println!("  Active:             {}", config.sink.is_active());
                println!(
                    "  URL:                {}",
                    config.sink.url.as_deref().unwrap_or("(none)")
                );
                println!("  Table:              {}", config.sink.table_name);
                println!(
                    "  API key:            {}",
                    if config.sink.api_key.is_some() { "set" } else { "(none)" }
                );
                println!();
                println!("[QR]");
                println!("  Error correction:   {:?}", config.qr.error_correction);
                println!("  Size:               {}", config.qr.size);
                println!();
                println!("[Identity]");
                println!("  Allow infants:      {}", config.identity.allow_infants);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_file(&path) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
