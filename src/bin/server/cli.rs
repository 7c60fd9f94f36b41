//! CLI mode: process local images in-process and print the job report.

use mathscrap::pipeline::{JobReport, MathPipeline, PipelineConfig};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Process `files` as one job and print the result.
pub async fn process_files(
    files: Vec<PathBuf>,
    context: Option<String>,
    config: PipelineConfig,
    output_format: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    let pipeline = MathPipeline::builder().config(config).build()?;

    let job_id = uuid::Uuid::new_v4().to_string();
    info!(job_id = %job_id, images = files.len(), "Processing job");
    let report = pipeline
        .process_job(job_id, &files, context.as_deref())
        .await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!("Job completed in {:.2}ms", elapsed_ms);

    output_report(&report, output_format, elapsed_ms)
}

fn output_report(
    report: &JobReport,
    format: &str,
    elapsed_ms: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string(report)?);
        }
        _ => {
            println!("\n=== Job {} ===", report.job_id);
            println!("Processing time: {:.2}ms", elapsed_ms);
            println!("Images: {} valid, {} invalid", report.succeeded, report.failed);

            for (idx, outcome) in report.images.iter().enumerate() {
                let recognition = &outcome.recognition;
                let validation = &outcome.validation;
                println!();
                println!("[{}] {}", idx + 1, outcome.image_path);
                println!(
                    "    Markup:     {} ({}, {:.1}%)",
                    recognition.latex,
                    recognition.source,
                    recognition.confidence * 100.0
                );
                println!("    Reading:    {}", recognition.text);
                if let Some(expression) = &validation.sympy_expression {
                    println!("    Expression: {}", expression);
                }
                if let Some(simplified) = &validation.simplified {
                    println!("    Simplified: {}", simplified);
                }
                if let Some(analysis) = &validation.analysis {
                    let degree = analysis
                        .degree
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "    Analysis:   {} (degree {})",
                        analysis.classification, degree
                    );
                }
                if let Some(solution) = &outcome.solution {
                    if solution.solvable {
                        for (var, roots) in &solution.solutions {
                            println!("    Solution:   {} = {}", var, roots.join(", "));
                        }
                    } else if let Some(error) = &solution.error {
                        println!("    Solution:   {}", error);
                    }
                }
                if let Some(error) = &validation.error {
                    println!("    Error:      {}", error);
                }
            }
        }
    }

    Ok(())
}
