//! Train the stacked text classifier and write scoring-set probabilities.

use std::path::PathBuf;

use textstack::app_dirs;
use textstack::config::PipelineConfig;
use textstack::logging;
use textstack::pipeline::run_files;

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let mut config = match &options.config {
        Some(path) => PipelineConfig::load(path).map_err(|err| err.to_string())?,
        None => {
            let path = app_dirs::default_config_path().map_err(|err| err.to_string())?;
            PipelineConfig::load_or_default(&path).map_err(|err| err.to_string())?
        }
    };
    options.apply(&mut config);
    config.validate().map_err(|err| err.to_string())?;
    let (train, test, output) = config.io_paths().map_err(|err| err.to_string())?;

    let result = run_files(&config, train, test, output).map_err(|err| err.to_string())?;
    let final_auc = result
        .diagnostics
        .last()
        .and_then(|diagnostics| diagnostics.pooled_auc);
    match final_auc {
        Some(auc) => println!("final model out-of-fold AUC: {auc:.6}"),
        None => println!("final model out-of-fold AUC: undefined"),
    }
    println!(
        "wrote {} predictions to {}",
        result.predictions.len(),
        output.display()
    );
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    train: Option<PathBuf>,
    test: Option<PathBuf>,
    pred: Option<PathBuf>,
    k_folds: Option<usize>,
    svd_components: Option<usize>,
    seed: Option<u64>,
}

impl CliOptions {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(path) = &self.train {
            config.train_path = Some(path.clone());
        }
        if let Some(path) = &self.test {
            config.test_path = Some(path.clone());
        }
        if let Some(path) = &self.pred {
            config.output_path = Some(path.clone());
        }
        if let Some(k) = self.k_folds {
            config.k_folds = k;
        }
        if let Some(k) = self.svd_components {
            config.svd_components = k;
        }
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--train" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--train requires a value".to_string())?;
                options.train = Some(PathBuf::from(value));
            }
            "--test" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--test requires a value".to_string())?;
                options.test = Some(PathBuf::from(value));
            }
            "--pred" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--pred requires a value".to_string())?;
                options.pred = Some(PathBuf::from(value));
            }
            "--k-folds" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--k-folds requires a value".to_string())?;
                options.k_folds = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --k-folds value: {value}"))?,
                );
            }
            "--svd-components" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--svd-components requires a value".to_string())?;
                options.svd_components = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --svd-components value: {value}"))?,
                );
            }
            "--seed" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--seed requires a value".to_string())?;
                options.seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("Invalid --seed value: {value}"))?,
                );
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "textstack",
        "",
        "Stacks naive Bayes text features under a gradient-boosted final model and",
        "writes the probability of label 1 for every scoring row.",
        "",
        "Usage:",
        "  textstack --train <csv> --test <csv> --pred <csv> [options]",
        "",
        "Options:",
        "  --config <file>           TOML config (default: .textstack/config.toml in the data dir).",
        "  --train <csv>             Labeled corpus: company,label,text.",
        "  --test <csv>              Scoring corpus: company,label,text (label may be empty).",
        "  --pred <csv>              Output path for company,label probabilities.",
        "  --k-folds <n>             Stratified folds per stacking pass (default: 5).",
        "  --svd-components <n>      Truncated SVD rank (default: 100).",
        "  --seed <n>                Random seed (default: 2017).",
    ]
    .join("\n")
}
