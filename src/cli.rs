use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slidereel")]
#[command(author, version, about = "Assemble rendered slides and narration into one narrated video")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render one job end to end
    Render {
        /// Job identifier; names the job directory and the artifact
        #[arg(long)]
        job_id: String,

        /// Requester's download handle, echoed in the completion event
        #[arg(long)]
        file_id: String,

        /// Slide images and clips (default: <slides_root>/<job_id>)
        #[arg(long)]
        visual_dir: Option<PathBuf>,

        /// Narration files (default: <audio_root>/<job_id>)
        #[arg(long)]
        audio_dir: Option<PathBuf>,

        /// Intro bumper
        #[arg(long)]
        intro: Option<PathBuf>,

        /// Outro bumper
        #[arg(long)]
        outro: Option<PathBuf>,

        /// Root under which the job directory is created
        #[arg(long)]
        output_root: Option<PathBuf>,
    },

    /// Show how slides and narration would be sequenced, without encoding
    Plan {
        /// Slide images and clips
        #[arg(long)]
        visual_dir: PathBuf,

        /// Narration files
        #[arg(long)]
        audio_dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process job requests read as JSON lines from stdin
    Worker,

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
