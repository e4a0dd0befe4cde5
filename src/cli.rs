use crate::config::PredictArgs;
use crate::models::{FilePrediction, Prediction};
use crate::predictor::Predictor;
use crate::preprocess;
use anyhow::{bail, Context, Result};
use image::DynamicImage;
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};

const BAR_WIDTH: f32 = 40.0;

pub fn run_predict(predictor: &Predictor, args: &PredictArgs) -> Result<()> {
    let files = expand_paths(&args.paths)?;
    let images = load_images(&files);
    if images.is_empty() {
        bail!("no readable images among {} candidate file(s)", files.len());
    }

    let mut results = Vec::with_capacity(images.len());
    for (path, img) in &images {
        let prediction = predictor
            .predict_image(img)
            .with_context(|| format!("classifying {}", path.display()))?;
        results.push(FilePrediction {
            file: path.display().to_string(),
            prediction,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            print!("{}", render_report(&result.file, &result.prediction));
        }
    }
    Ok(())
}

pub fn run_info(predictor: &Predictor) -> Result<()> {
    let model = predictor.store.get()?;
    let status = predictor.store.status();
    let summary = model.summary();

    println!("{}", "=".repeat(70));
    println!("MODEL INFORMATION");
    println!("{}", "=".repeat(70));
    println!("Path:         {}", status.model_path);
    if let Some(size) = status.file_size_bytes {
        println!("File size:    {:.2} MB", size as f64 / 1024.0 / 1024.0);
    }
    println!("Engine:       {} ({})", summary.engine, summary.load_variant);
    println!("Input shape:  [{}]", summary.input_shape.join(", "));
    println!("Output shape: [{}]", summary.output_shape.join(", "));
    println!("Nodes:        {}", summary.node_count);
    println!("\nClasses ({}):", predictor.labels.len());
    for (index, name) in predictor.labels.iter() {
        println!("  {}: {}", index, name);
    }
    println!("{}", "=".repeat(70));
    Ok(())
}

fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = preprocess::find_images(path)
                .with_context(|| format!("listing {}", path.display()))?;
            if found.is_empty() {
                warn!("no images found in {}", path.display());
            }
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

// Unreadable files are skipped, not fatal.
fn load_images(files: &[PathBuf]) -> Vec<(PathBuf, DynamicImage)> {
    files
        .iter()
        .filter_map(|path| match read_image(path) {
            Ok(img) => Some((path.clone(), img)),
            Err(e) => {
                warn!("skipped {}: {:#}", path.display(), e);
                None
            }
        })
        .collect()
}

fn read_image(path: &Path) -> Result<DynamicImage> {
    let bytes = fs::read(path)?;
    Ok(preprocess::decode(&bytes)?)
}

fn render_report(file: &str, prediction: &Prediction) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "=".repeat(60)));
    out.push_str(&format!("Image: {}\n", file));
    out.push_str(&format!(
        "Predicted class: {} (ID: {})\n",
        prediction.label, prediction.class_index
    ));
    out.push_str(&format!(
        "Confidence: {:.4} ({:.2}%)\n",
        prediction.confidence,
        prediction.confidence * 100.0
    ));
    out.push_str("\nAll class probabilities:\n");

    let mut ranked: Vec<_> = prediction.probabilities.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1));
    for (name, probability) in ranked {
        let bar = "#".repeat((probability * BAR_WIDTH) as usize);
        out.push_str(&format!("  {:10}: {:.6} {}\n", name, probability, bar));
    }
    out.push_str(&format!("{}\n", "=".repeat(60)));
    out
}
