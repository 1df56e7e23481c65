// thumbgen 命令行
// 为一个目录启动任务，显示进度条和日志，Ctrl-C 请求取消

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use thumbgen::{Event, JobController, JobState, ThumbnailerConfig};

/// 为目录中的 jpg 图片生成缩略图，输出到 thumbnails 子目录
#[derive(Parser)]
#[command(name = "thumbgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 输入目录
    directory: PathBuf,

    /// 配置文件（默认读取用户配置目录下的 thumbgen/config.toml）
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 以 JSON Lines 输出所有事件
    #[arg(long)]
    json: bool,

    /// 提高日志级别 (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(&cli).await {
        Ok(state) => exit_code(state),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<JobState, thumbgen::ThumbnailError> {
    let config = ThumbnailerConfig::load(cli.config.as_deref())?;
    let controller = JobController::new(config);
    let mut handle = controller.start_job(&cli.directory)?;

    let token = handle.cancel_token();
    let job_id = handle.id();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && token.cancel() {
            log::info!("收到 Ctrl-C，取消任务 {}", job_id);
        }
    });

    let bar = if cli.json {
        None
    } else {
        Some(progress_bar())
    };

    while let Some(event) = handle.events().recv().await {
        if cli.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => log::warn!("事件序列化失败: {}", e),
            }
        } else if let Some(bar) = &bar {
            match &event {
                Event::Progress(progress) => bar.set_position(u64::from(progress.percent)),
                Event::Log(line) => bar.println(&line.message),
                Event::Finished(_) => bar.finish_and_clear(),
            }
        }

        if matches!(event, Event::Finished(_)) {
            break;
        }
    }

    let report = handle.wait().await?;
    if let Some(error) = &report.error {
        log::error!("任务失败: {}", error);
    }
    Ok(report.state)
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}%")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

fn exit_code(state: JobState) -> ExitCode {
    match state {
        JobState::Completed => ExitCode::SUCCESS,
        JobState::Cancelled => ExitCode::from(130),
        _ => ExitCode::FAILURE,
    }
}
