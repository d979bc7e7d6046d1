use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use varscore::genomics::{peak_overlap, read_chrom_sizes, read_peaks, read_variant_table};
use varscore::scoring::{
    read_score_table, write_annotated_score_table, write_score_table_file, PeakInput, VariantScorer,
};
use varscore::{ScoringConfig, ShuffleSpec, TablePredictionModel, VariantSchema};

#[derive(Parser, Debug)]
#[command(name = "varscore", about = "Score variant effects from sequence-to-signal model predictions")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score every variant with every model.
    Score(ScoreArgs),
    /// Append a peak overlap column to a score table.
    Annotate(AnnotateArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SchemaArg {
    Bed,
    Chrombpnet,
}

impl From<SchemaArg> for VariantSchema {
    fn from(value: SchemaArg) -> Self {
        match value {
            SchemaArg::Bed => VariantSchema::Bed,
            SchemaArg::Chrombpnet => VariantSchema::Chrombpnet,
        }
    }
}

#[derive(Args, Debug)]
struct ScoreArgs {
    /// Variant table.
    #[arg(short = 'l', long)]
    variant_list: PathBuf,
    /// Layout of the variant table.
    #[arg(long, value_enum, default_value = "chrombpnet")]
    schema: SchemaArg,
    /// Prediction tables, one per model.
    #[arg(short, long, num_args = 1.., required = true)]
    models: Vec<PathBuf>,
    /// Chromosome sizes of the variant genome.
    #[arg(short = 'c', long)]
    chrom_sizes: PathBuf,
    /// Existing directory for score tables and archives.
    #[arg(short = 'o', long)]
    scoring_output_dir: PathBuf,
    /// Output prefix `<sample>.<model index>`.
    #[arg(short, long, required_unless_present = "score_filenames")]
    sample_name: Option<String>,
    /// Output prefixes, one per model, replacing the sample naming.
    #[arg(long, num_args = 1..)]
    score_filenames: Vec<String>,
    /// narrowPeak file used as the percentile background.
    #[arg(short, long)]
    peaks: Option<PathBuf>,
    /// Chromosome sizes of the peak genome (defaults to --chrom-sizes).
    #[arg(long, requires = "peaks")]
    peak_chrom_sizes: Option<PathBuf>,
    /// Subsample the peak background to at most this many peaks.
    #[arg(long, requires = "peaks")]
    max_peaks: Option<usize>,
    /// Shuffled/control set size.
    #[arg(long, conflicts_with = "num_shuf")]
    total_shuf: Option<usize>,
    /// Shuffled/control rows per variant.
    #[arg(long)]
    num_shuf: Option<usize>,
    /// Only score variants on this chromosome.
    #[arg(long)]
    chrom: Option<String>,
    /// Requests per inference call.
    #[arg(short, long, default_value_t = 64)]
    batch_size: usize,
    /// Subsample every table to --debug-size rows.
    #[arg(long)]
    debug_mode: bool,
    /// Rows kept in debug mode.
    #[arg(long, default_value_t = 10_000)]
    debug_size: usize,
    /// Predict the forward strand only.
    #[arg(long)]
    forward_only: bool,
    /// Skip writing the prediction archive.
    #[arg(long, alias = "no-hdf5")]
    no_archive: bool,
    /// Seed for all sampling.
    #[arg(long, default_value_t = 1234)]
    random_seed: u64,
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Score table written by `varscore score`.
    #[arg(short = 'i', long)]
    score_table: PathBuf,
    /// narrowPeak file.
    #[arg(short, long)]
    peaks: PathBuf,
    /// Annotated table destination.
    #[arg(short, long)]
    output: PathBuf,
    /// Expected layout of the score table.
    #[arg(long, value_enum)]
    schema: Option<SchemaArg>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Score(args) => run_score(args)?,
        Commands::Annotate(args) => run_annotate(args)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

impl ScoreArgs {
    fn shuffle(&self) -> ShuffleSpec {
        match (self.total_shuf, self.num_shuf) {
            (Some(total), _) => ShuffleSpec::Total(total),
            (None, Some(per_variant)) => ShuffleSpec::PerVariant(per_variant),
            (None, None) => ShuffleSpec::Disabled,
        }
    }

    fn config(&self) -> ScoringConfig {
        ScoringConfig::new(self.schema.into())
            .with_batch_size(self.batch_size)
            .with_seed(self.random_seed)
            .with_shuffle(self.shuffle())
            .with_forward_only(self.forward_only)
            .with_chrom(self.chrom.clone())
            .with_debug_sample(self.debug_mode.then_some(self.debug_size))
            .with_max_peaks(self.max_peaks)
    }

    /// `(score table, archive)` paths for a model.
    fn output_paths(&self, model_idx: usize) -> Result<(PathBuf, PathBuf)> {
        let dir = &self.scoring_output_dir;
        if let Some(name) = self.score_filenames.get(model_idx) {
            return Ok((dir.join(format!("{name}.tsv")), dir.join(format!("{name}.bin.gz"))));
        }
        let Some(sample) = &self.sample_name else {
            bail!("no output name for model {model_idx}");
        };
        Ok((
            dir.join(format!("{sample}.{model_idx}.variant_scores.tsv")),
            dir.join(format!("{sample}.{model_idx}.variant_predictions.bin.gz")),
        ))
    }
}

fn run_score(args: ScoreArgs) -> Result<()> {
    ensure!(
        args.scoring_output_dir.is_dir(),
        "output directory {} does not exist",
        args.scoring_output_dir.display()
    );
    ensure!(
        args.score_filenames.is_empty() || args.score_filenames.len() == args.models.len(),
        "got {} score filenames for {} models",
        args.score_filenames.len(),
        args.models.len()
    );
    let config = args.config();
    config.validate().context("invalid scoring options")?;

    let schema = VariantSchema::from(args.schema);
    let variants = read_variant_table(&args.variant_list, schema)
        .with_context(|| format!("failed to read variants from {}", args.variant_list.display()))?;
    let chrom_sizes = read_chrom_sizes(&args.chrom_sizes)
        .with_context(|| format!("failed to read chromosome sizes from {}", args.chrom_sizes.display()))?;

    let peaks = match &args.peaks {
        Some(path) => {
            Some(read_peaks(path).with_context(|| format!("failed to read peaks from {}", path.display()))?)
        }
        None => None,
    };
    let peak_chrom_sizes = match &args.peak_chrom_sizes {
        Some(path) => Some(
            read_chrom_sizes(path)
                .with_context(|| format!("failed to read peak chromosome sizes from {}", path.display()))?,
        ),
        None => None,
    };
    let peak_input = peaks.as_deref().map(|peaks| PeakInput {
        peaks,
        chrom_sizes: peak_chrom_sizes.as_ref().unwrap_or(&chrom_sizes),
    });

    for (model_idx, model_path) in args.models.iter().enumerate() {
        let mut model = TablePredictionModel::from_path(model_path)
            .with_context(|| format!("failed to load model {}", model_path.display()))?;
        info!(model = %model_path.display(), index = model_idx, "scoring with model");

        let output = VariantScorer::new(&mut model, config.clone())?
            .run(variants.clone(), &chrom_sizes, peak_input)
            .with_context(|| format!("scoring failed for model {}", model_path.display()))?;
        if output.table.is_empty() {
            warn!(model = %model_path.display(), "no variants passed filtering");
        }

        let (table_path, archive_path) = args.output_paths(model_idx)?;
        write_score_table_file(&table_path, &output.table)
            .with_context(|| format!("failed to write {}", table_path.display()))?;
        if !args.no_archive {
            output
                .archive
                .write_file(&archive_path)
                .with_context(|| format!("failed to write {}", archive_path.display()))?;
        }
        info!(
            table = %table_path.display(),
            variants = output.table.len(),
            shuffled = output.shuffled_variants,
            peaks = output.background_peaks,
            "model finished"
        );
    }

    Ok(())
}

fn run_annotate(args: AnnotateArgs) -> Result<()> {
    let table = read_score_table(&args.score_table)
        .with_context(|| format!("failed to read score table {}", args.score_table.display()))?;
    if let Some(expected) = args.schema.map(VariantSchema::from) {
        ensure!(
            expected == table.schema,
            "{} is a {} table, not {}",
            args.score_table.display(),
            table.schema.name(),
            expected.name()
        );
    }
    let peaks = read_peaks(&args.peaks)
        .with_context(|| format!("failed to read peaks from {}", args.peaks.display()))?;

    info!(variants = table.len(), peaks = peaks.len(), "annotating with peak overlap");
    let flags: Vec<String> = peak_overlap(table.records.iter().map(|r| &r.variant), &peaks)
        .into_iter()
        .map(|overlap| if overlap { "True" } else { "False" }.to_string())
        .collect();

    write_annotated(&args.output, table, flags)
}

fn write_annotated(path: &Path, table: varscore::ScoreTable, flags: Vec<String>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_annotated_score_table(&mut writer, table, "peak_overlap", flags)
}
