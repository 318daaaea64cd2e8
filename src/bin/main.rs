//! seqkernel Command Line Interface
//!
//! Computes subsequence string kernel matrices from plain-text sequence
//! files and inspects saved matrices.

use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use seqkernel::api::StringKernel;
use seqkernel::core::{KernelError, KernelMatrix, Result};
use seqkernel::utils::{memory, spectral, stats};
use seqkernel::{SequenceSource, SerializableKernelMatrix, TextSequences};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "seqkernel")]
#[command(about = "Subsequence string kernel matrices")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "seqkernel contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a kernel matrix from sequence files
    Matrix(MatrixArgs),
    /// Compute the kernel value of two sequences
    Similarity(SimilarityArgs),
    /// Display a saved kernel matrix summary
    Info(InfoArgs),
    /// Check a saved kernel matrix for symmetry and positive semi-definiteness
    Check(CheckArgs),
}

#[derive(Args, Clone)]
struct KernelArgs {
    /// Maximum subsequence length
    #[arg(short = 'k', long, default_value = "2")]
    max_length: usize,

    /// Decay factor lambda in (0, 1]
    #[arg(short = 'l', long, default_value = "0.5")]
    lambda: f64,

    /// Report raw kernel values instead of normalized ones
    #[arg(long)]
    no_normalize: bool,
}

impl KernelArgs {
    fn string_kernel(&self) -> StringKernel {
        StringKernel::new()
            .with_max_length(self.max_length)
            .with_decay(self.lambda)
            .with_normalization(!self.no_normalize)
    }
}

#[derive(Args)]
struct MatrixArgs {
    /// Sequence file, one sequence per line (optionally `name<TAB>sequence`)
    #[arg(long)]
    data: PathBuf,

    /// Second sequence file for a rectangular matrix (defaults to --data)
    #[arg(long)]
    right: Option<PathBuf>,

    /// Output JSON file (prints a tab-separated matrix if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Compute rows on a single thread
    #[arg(long)]
    sequential: bool,

    #[command(flatten)]
    kernel: KernelArgs,
}

#[derive(Args)]
struct SimilarityArgs {
    /// First sequence
    first: String,

    /// Second sequence
    second: String,

    #[command(flatten)]
    kernel: KernelArgs,
}

#[derive(Args)]
struct InfoArgs {
    /// Saved kernel matrix file
    matrix: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    /// Saved kernel matrix file
    matrix: PathBuf,

    /// Tolerance for negative eigenvalues
    #[arg(long, default_value = "1e-9")]
    epsilon: f64,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Matrix(args) => matrix_command(args),
        Commands::Similarity(args) => similarity_command(args),
        Commands::Info(args) => info_command(args),
        Commands::Check(args) => check_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn matrix_command(args: MatrixArgs) -> Result<()> {
    let kernel = args
        .kernel
        .string_kernel()
        .with_parallelism(!args.sequential);
    let params = kernel.parameters();
    info!(
        "Parameters: max_length={}, lambda={}, normalize={}",
        params.max_subsequence_length, params.decay_factor, !args.kernel.no_normalize
    );

    info!("Loading sequences from: {:?}", args.data);
    let left = TextSequences::from_file(&args.data)?;
    info!(
        "Loaded {} sequences (longest {})",
        left.len(),
        left.max_len()
    );

    let (matrix, col_names) = match &args.right {
        Some(path) => {
            info!("Loading right-hand sequences from: {path:?}");
            let right = TextSequences::from_file(path)?;
            log_estimates(params.max_subsequence_length, &left, &right);
            (kernel.cross_matrix(&left, &right)?, right.names().to_vec())
        }
        None => {
            log_estimates(params.max_subsequence_length, &left, &left);
            (kernel.matrix(&left)?, left.names().to_vec())
        }
    };
    info!("Computed {}x{} kernel matrix", matrix.rows(), matrix.cols());

    match args.output {
        Some(path) => {
            SerializableKernelMatrix::from_matrix(&matrix, params, !args.kernel.no_normalize)
                .with_names(left.names().to_vec(), col_names)
                .save_to_file(&path)?;
            info!("Kernel matrix saved to: {path:?}");
        }
        None => write_table(&matrix, left.names(), &col_names)?,
    }

    Ok(())
}

fn log_estimates(max_length: usize, left: &TextSequences, right: &TextSequences) {
    let longest = left.max_len().max(right.max_len());
    info!(
        "Estimated memory: {} bytes matrix, {} bytes scratch per thread",
        memory::estimate_matrix_bytes(left.len(), right.len()),
        memory::estimate_scratch_bytes(max_length, longest)
    );
}

/// Print a matrix as tab-separated values with a header row
fn write_table(matrix: &KernelMatrix, row_names: &[String], col_names: &[String]) -> Result<()> {
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    writeln!(writer, "\t{}", col_names.join("\t")).map_err(KernelError::IoError)?;
    for (i, name) in row_names.iter().enumerate() {
        let cells: Vec<String> = matrix.row(i).iter().map(|v| format!("{v:.6}")).collect();
        writeln!(writer, "{}\t{}", name, cells.join("\t")).map_err(KernelError::IoError)?;
    }
    writer.flush().map_err(KernelError::IoError)?;
    Ok(())
}

fn similarity_command(args: SimilarityArgs) -> Result<()> {
    let first: Vec<char> = args.first.chars().collect();
    let second: Vec<char> = args.second.chars().collect();
    let value = args.kernel.string_kernel().similarity(&first, &second)?;
    println!("{value:.12}");
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading kernel matrix from: {:?}", args.matrix);
    let saved = SerializableKernelMatrix::load_from_file(&args.matrix)?;
    saved.print_summary();

    let matrix = saved.to_matrix()?;
    let summary = stats::matrix_stats(&matrix);
    println!("Values:");
    println!("  Min: {:.6}", summary.min);
    println!("  Max: {:.6}", summary.max);
    println!("  Mean: {:.6}", summary.mean);
    println!("  Off-diagonal Mean: {:.6}", summary.off_diagonal_mean);
    println!("  Symmetric: {}", summary.symmetric);
    Ok(())
}

fn check_command(args: CheckArgs) -> Result<()> {
    let saved = SerializableKernelMatrix::load_from_file(&args.matrix)?;
    let matrix = saved.to_matrix()?;

    if !matrix.is_symmetric() {
        return Err(KernelError::InvalidParameter(
            "Kernel matrix is not symmetric".to_string(),
        ));
    }

    let eigenvalues = spectral::symmetric_eigenvalues(&matrix)?;
    let min = eigenvalues.first().copied().unwrap_or(0.0);
    println!("Symmetric: true");
    println!("Smallest eigenvalue: {min:.6e}");

    if min < -args.epsilon {
        return Err(KernelError::InvalidParameter(format!(
            "Kernel matrix is not positive semi-definite (smallest eigenvalue {min:.6e})"
        )));
    }
    println!("Positive semi-definite: true");
    Ok(())
}
