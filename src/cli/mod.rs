use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Index a project, or incrementally refresh an existing snapshot
    Index {
        /// Path to the project root to index
        path: String,

        /// Optional display name for the project (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Discard any cached snapshot and rebuild from scratch
        #[arg(short, long)]
        force: bool,
    },

    /// Run a hybrid (BM25 + vector) search over an indexed project
    Search {
        /// Path to the indexed project root
        path: String,

        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(long, default_value = "10")]
        num: usize,

        /// Minimum fused score (0.0 to 1.0)
        #[arg(short, long)]
        min_score: Option<f32>,

        /// Filter by language tag (e.g. rust, python)
        #[arg(short = 'L', long)]
        language: Option<Vec<String>>,

        /// Cap the result set to a token budget instead of printing all matches
        #[arg(long)]
        budget: Option<u32>,
    },

    /// List indexed projects
    List,

    /// Delete an indexed project's snapshot and vectors
    Delete {
        /// User id of the project to delete
        #[arg(short, long, default_value = "default")]
        user_id: String,

        /// Branch of the project to delete
        branch: String,
    },

    /// Show aggregate statistics across indexed projects
    Stats,
}
