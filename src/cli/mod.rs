use crate::db::{self, ConsultationRepository};
use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "teleconsult")]
#[command(about = "Video consultation client with recording and transcription", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Room name to join (overrides config)
    #[arg(long, global = true)]
    pub room: Option<String>,

    /// Appointment identifier (overrides config)
    #[arg(long, global = true)]
    pub appointment: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// List past consultations
    History(HistoryCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct HistoryCliArgs {
    /// Maximum number of results to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

pub fn handle_history_command(args: HistoryCliArgs) -> Result<()> {
    let conn = db::init_db()?;
    let records = ConsultationRepository::list(&conn, args.limit)?;

    if records.is_empty() {
        println!("No consultations recorded yet.");
        return Ok(());
    }

    println!("Found {} consultation(s):\n", records.len());

    for record in records {
        println!("ID: {}", record.id);
        println!("Appointment: {}", record.appointment_id);
        println!("Room: {}", record.room_name);
        println!("Status: {}", record.status);
        println!("Started: {}", record.started_at);
        if let Some(duration) = record.duration_seconds {
            println!("Duration: {}s", duration);
        }
        if let Some(transcription_id) = record.transcription_id.as_deref() {
            println!("Transcription: {}", transcription_id);
        }
        if let Some(error) = record.error.as_deref() {
            println!("Error: {}", error);
        }
        println!("---");
    }

    Ok(())
}
