use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(about = "An optimising compiler back end for the DLX machine")]
pub struct Options {
    #[clap(subcommand)]
    pub operation: Operation,
    #[clap(short, long, default_value_t = 1)]
    pub verbose: usize,
}

#[derive(Debug, Subcommand)]
pub enum Operation {
    /// Compile a listing to a machine image
    Compile {
        file: String,
        #[clap(flatten)]
        backend: BackendOptions,
        /// Output path for the image (defaults to the input with `.dlx`)
        #[clap(short, long)]
        output: Option<String>,
    },
    /// Print the control-flow graphs in Graphviz dot form
    Dot {
        file: String,
        #[clap(flatten)]
        backend: BackendOptions,
    },
}

#[derive(Debug, Args)]
pub struct BackendOptions {
    /// Optimisations to run: dce, cf, cp, cpp, cse, or max for all
    #[clap(short = 'O', long = "opt")]
    pub optimisations: Vec<String>,
    /// Register budget for the allocator
    #[clap(short, long, default_value_t = crate::codegen::MAX_ALLOC)]
    pub registers: u8,
}
