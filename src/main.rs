use allerguard::{cli, config, ocr, pipeline, profile, scanner};
use allerguard_common::{FuzzyMatcher, PipelineReport, ReportStatus};
use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::Pipeline;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load()?;
    if let Some(provider) = cli.ai_provider {
        config.provider = provider;
    }

    match cli.command {
        Commands::Scan { image, allergens, profile, output, use_cache } => {
            println!("🧴 allerguard - ラベル解析\n");

            let allergens = cli::collect_allergens(&allergens, profile.then_some(config.allergens.as_slice()));
            let pipeline = Pipeline::from_config(&config, use_cache)?;

            println!("[1/2] 解析中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let report = pipeline.run(&image, &allergens).await;
            print_summary(&report);

            println!("\n[2/2] 結果を保存中...");
            let output = output.unwrap_or_else(|| {
                image
                    .parent()
                    .unwrap_or(Path::new("."))
                    .join(cli::report_file_name(&image))
            });
            write_report(&report, &output)?;
            println!("✔ 結果を保存: {}", output.display());
        }

        Commands::Batch { folder, allergens, profile, output, use_cache, jobs } => {
            println!("🧴 allerguard - 一括解析\n");

            let allergens = cli::collect_allergens(&allergens, profile.then_some(config.allergens.as_slice()));

            println!("[1/3] 画像をスキャン中...");
            let images = scanner::scan_folder(&folder)?;
            if images.is_empty() {
                return Err(allerguard::AllerGuardError::NoImagesFound(folder.display().to_string()).into());
            }
            println!("✔ {}枚の画像を検出\n", images.len());

            let pipeline = Pipeline::from_config(&config, use_cache)?;
            let output_dir = output.unwrap_or_else(|| folder.clone());
            std::fs::create_dir_all(&output_dir)?;

            println!("[2/3] 解析中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let progress = ProgressBar::new(images.len() as u64);
            progress.set_style(
                ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let reports: Vec<(PathBuf, PipelineReport)> = futures::stream::iter(&images)
                .map(|info| {
                    let pipeline = &pipeline;
                    let allergens = &allergens;
                    let progress = &progress;
                    async move {
                        let report = pipeline.run(&info.path, allergens).await;
                        progress.set_message(info.file_name.clone());
                        progress.inc(1);
                        (info.path.clone(), report)
                    }
                })
                .buffered(jobs.max(1))
                .collect()
                .await;
            progress.finish_and_clear();
            println!("✔ 解析完了\n");

            println!("[3/3] 結果を保存中...");
            for (image, report) in &reports {
                let path = output_dir.join(cli::report_file_name(image));
                write_report(report, &path)?;
                println!(
                    "  {} → {} ({})",
                    image.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
                    report.recommendation_or_message(),
                    path.display()
                );
            }
            println!("\n✅ {}件のレポートを保存", reports.len());
        }

        Commands::Extract { input } => {
            let text = if input.as_os_str() == "-" {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                std::fs::read_to_string(&input)
                    .with_context(|| format!("読み込めません: {}", input.display()))?
            };

            let cleaner = config.text_cleaner()?;
            let ingredients = allerguard_common::IngredientExtractor::default().extract(&cleaner.clean(&text));
            if ingredients.is_empty() {
                println!("{}", allerguard_common::report::MSG_NO_INGREDIENTS);
            }
            for (i, name) in ingredients.iter().enumerate() {
                println!("{:>3}. {}", i + 1, name);
            }
        }

        Commands::Match { allergen, ingredient } => {
            let matcher = FuzzyMatcher::new(config.match_threshold);
            let result = matcher.match_pair(&allergen, &ingredient);
            println!(
                "{} ⇔ {}: {} ({:.1}%)",
                allergen,
                ingredient,
                if result.is_match { "一致" } else { "不一致" },
                result.score * 100.0
            );
            println!("  {}", result.reason);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Profile { add, remove, clear, show, interactive } => {
            if interactive {
                profile::run_interactive_profile(&mut config)?;
                return Ok(());
            }

            let mut changed = false;
            if clear {
                config.clear_allergens();
                println!("✔ アレルゲンをすべて削除しました");
                changed = true;
            }
            for name in &add {
                if config.add_allergen(name) {
                    println!("✔ 追加: {}", name);
                    changed = true;
                }
            }
            for name in &remove {
                if config.remove_allergen(name) {
                    println!("✔ 削除: {}", name);
                    changed = true;
                } else {
                    println!("{} は登録されていません", name);
                }
            }
            if changed {
                config.save()?;
            }

            if show || !changed {
                println!("登録済みアレルゲン:");
                for line in profile::describe(&config) {
                    println!("{}", line);
                }
            }
        }

        Commands::Config { show, set_model, set_provider } => {
            let mut changed = false;

            if let Some(model) = set_model {
                config.model = model;
                changed = true;
            }
            if let Some(provider) = set_provider {
                config.provider = provider;
                changed = true;
            }
            if changed {
                config.validate()?;
                config.save()?;
                println!("✔ 設定を保存しました: {}", Config::config_path()?.display());
            }

            if show || !changed {
                println!("設定:");
                println!("  プロバイダ: {}", config.provider);
                println!("  モデル: {}", config.model);
                println!("  Ollama URL: {}", config.ollama_url);
                println!("  tesseract: {} (-l {})", config.tesseract_cmd, config.ocr_languages);
                println!(
                    "  タイムアウト: OCR {}秒 / 正規化 {}秒 / 解析 {}秒",
                    config.ocr_timeout_seconds, config.normalize_timeout_seconds, config.analysis_timeout_seconds
                );
                println!("  照合しきい値: {}", config.match_threshold);
                println!("  登録アレルゲン: {}件", config.allergens.len());
            }
        }

        Commands::Cache { clear, folder, info } => {
            let target = folder.unwrap_or_else(|| PathBuf::from("."));
            let cache_path = ocr::OcrCache::path(&target);

            if info || !clear {
                if cache_path.exists() {
                    let cache = ocr::OcrCache::load(&target);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match ocr::OcrCache::clear(&target) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

/// RUST_LOG 優先、なければ info（--verbose で debug）
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_report(report: &PipelineReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("書き込めません: {}", path.display()))?;
    Ok(())
}

fn print_summary(report: &PipelineReport) {
    if report.status == ReportStatus::Error {
        println!("✘ {}", report.message);
        return;
    }

    println!("✔ 成分 {}件", report.cleaned_ingredients.len());
    for name in &report.cleaned_ingredients {
        println!("    {}", name);
    }

    if report.detected_allergens.is_empty() {
        println!("\n{}", report.recommendation_or_message());
        return;
    }

    println!("\n⚠ 検出されたアレルゲン:");
    for detected in &report.detected_allergens {
        println!(
            "  - {} ({}, {:.0}%) [{}]",
            detected.ingredient,
            detected.matched_allergen,
            detected.match_score * 100.0,
            detected.risk_level
        );
        if !detected.symptoms.is_empty() {
            println!("      症状: {}", detected.symptoms);
        }
        if !detected.recommendation.is_empty() {
            println!("      対処: {}", detected.recommendation);
        }
        if !detected.alternatives.is_empty() {
            println!("      代替: {}", detected.alternatives.join(", "));
        }
    }
    println!("\n{}", report.recommendation);
}
