use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use threadgraph::prelude::*;
use threadgraph::{annotation, hn, twitter};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Build argument graphs from conversation threads
#[derive(Parser, Debug)]
#[command(name = "threadgraph")]
#[command(about = "Build argument graphs from Twitter and Hacker News threads", long_about = None)]
struct Args {
    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a JSON Lines dump of Twitter API v2 responses
    Twitter(ConvertArgs),
    /// Convert a JSON Lines dump of Hacker News items and users
    Hn(ConvertArgs),
    /// Manual annotation of scheme nodes
    #[command(subcommand)]
    Annotate(AnnotateCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Twitter,
    Hn,
}

#[derive(ClapArgs, Debug)]
struct ConvertArgs {
    /// Input file
    input: PathBuf,

    /// Output folder, recreated on every run
    output: PathBuf,

    #[command(flatten)]
    text: TextArgs,

    #[command(flatten)]
    graph: GraphArgs,

    /// Address of the entailment service used to label schemes
    #[arg(long)]
    entailment_address: Option<String>,

    /// Process conversations in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(ClapArgs, Debug)]
struct TextArgs {
    /// Keep mentions and short links in the post text
    #[arg(long)]
    raw_text: bool,

    /// Minimum number of characters of a reply
    #[arg(long, default_value_t = 0)]
    min_chars: u64,

    /// Maximum number of characters of a reply
    #[arg(long)]
    max_chars: Option<u64>,

    /// Minimum likes + replies + quotes + retweets of a reply
    #[arg(long, default_value_t = 0)]
    min_interactions: u64,

    /// Maximum likes + replies + quotes + retweets of a reply
    #[arg(long)]
    max_interactions: Option<u64>,

    /// Replies declaring another language are skipped
    #[arg(long, default_value = "en")]
    language: String,

    /// Raw fields copied into atom userdata (comma separated)
    #[arg(long, value_delimiter = ',')]
    userdata: Option<Vec<String>>,
}

#[derive(ClapArgs, Debug)]
struct GraphArgs {
    /// Leaves this close to the major claim are removed
    #[arg(long, default_value_t = 0)]
    min_depth: u64,

    /// Branches are cut back to this depth
    #[arg(long)]
    max_depth: Option<u64>,

    /// Minimum number of atom nodes of a stored graph
    #[arg(long, default_value_t = 2)]
    min_nodes: u64,

    /// Maximum number of atom nodes of a stored graph
    #[arg(long)]
    max_nodes: Option<u64>,

    /// Render every stored graph to PDF with Graphviz
    #[arg(long)]
    render: bool,
}

#[derive(Subcommand, Debug)]
enum AnnotateCommand {
    /// Collect every premise/claim pair into an annotation file
    Export {
        /// Folder containing stored graphs
        input: PathBuf,
        /// Glob over paths relative to the input folder
        #[arg(long, default_value = "**/*.json")]
        pattern: String,
        /// Annotation file to write
        #[arg(long, default_value = "annotations/dataset.json")]
        annotations: PathBuf,
    },
    /// Write annotated labels back into the stored graphs
    Import {
        /// Folder containing stored graphs
        input: PathBuf,
        /// Annotation file to read
        #[arg(long, default_value = "annotations/dataset.json")]
        annotations: PathBuf,
    },
    /// Label the open pairs of an annotation file on the terminal
    Label {
        /// Annotation file, rewritten after every answer
        #[arg(default_value = "annotations/dataset.json")]
        annotations: PathBuf,
    },
    /// Cohen's kappa between two annotation files
    Agreement { first: PathBuf, second: PathBuf },
}

impl ConvertArgs {
    fn pipeline_config(&self, source: Source) -> PipelineConfig {
        let userdata = self.text.userdata.clone().unwrap_or_else(|| match source {
            Source::Twitter => threadgraph::config::default_userdata(),
            Source::Hn => hn::DEFAULT_USERDATA.iter().map(|s| s.to_string()).collect(),
        });

        PipelineConfig {
            text: TextConfig {
                clean: !self.text.raw_text,
                chars: Bounds::new(self.text.min_chars, self.text.max_chars),
                interactions: Bounds::new(self.text.min_interactions, self.text.max_interactions),
                language: self.text.language.clone(),
                userdata,
            },
            graph: GraphConfig {
                depth: Bounds::new(self.graph.min_depth, self.graph.max_depth),
                nodes: Bounds::new(self.graph.min_nodes, self.graph.max_nodes),
                render: self.graph.render,
            },
            entailment_address: self.entailment_address.clone(),
        }
    }
}

fn convert(source: Source, args: &ConvertArgs) -> anyhow::Result<()> {
    let config = args.pipeline_config(source);
    config.validate()?;

    info!("Reading {:?}", args.input);
    let batch = match source {
        Source::Twitter => twitter::load(&args.input),
        Source::Hn => hn::load(&args.input),
    }
    .with_context(|| format!("cannot read {}", args.input.display()))?;

    let layout = OutputLayout::prepare(&args.output, &config)?;
    info!("Output folder: {:?}", layout.root());

    let classifier = threadgraph::connect_classifier(config.entailment_address.as_deref());

    let pipeline = Pipeline::new(&config, &layout)?
        .with_classifier(classifier.as_ref().map(|c| c as &dyn EntailmentClassifier));

    let conversations = batch.conversations();
    info!("Processing {} conversations", conversations.len());

    let report = pipeline.run(&conversations, args.parallel);
    info!(
        "Stored {} graphs, discarded {}, failed {}",
        report.serialized,
        report.discarded,
        report.failed.len()
    );

    Ok(())
}

fn annotate(command: &AnnotateCommand) -> anyhow::Result<()> {
    match command {
        AnnotateCommand::Export {
            input,
            pattern,
            annotations,
        } => {
            let set = annotation::export(input, pattern)?;
            set.save(annotations)?;
            info!("Total annotations: {}", set.scheme_count());
        }
        AnnotateCommand::Import { input, annotations } => {
            let set = AnnotationSet::load(annotations)
                .with_context(|| format!("cannot read {}", annotations.display()))?;
            let report = annotation::import(input, &set)?;
            info!("Labeled {} schemes in {} graphs", report.labeled, report.graphs);
        }
        AnnotateCommand::Label { annotations } => {
            let stdin = std::io::stdin();
            let report = annotation::label_interactive(annotations, stdin.lock(), std::io::stdout())
                .with_context(|| format!("cannot label {}", annotations.display()))?;
            info!("Labeled {} pairs, {} remaining", report.labeled, report.remaining);
        }
        AnnotateCommand::Agreement { first, second } => {
            let result = annotation::agreement(&AnnotationSet::load(first)?, &AnnotationSet::load(second)?)?;
            println!(
                "items: {}\nobserved agreement: {:.4}\ncohen's kappa: {:.4}",
                result.items, result.observed, result.kappa
            );
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting threadgraph v{}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Twitter(convert_args) => convert(Source::Twitter, convert_args),
        Command::Hn(convert_args) => convert(Source::Hn, convert_args),
        Command::Annotate(command) => annotate(command),
    }
}
