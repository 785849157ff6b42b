use std::time::Duration;

use clap::{Arg, ArgAction, Command};
use tracing::{error, info, warn, Level};

use straitsim::logging::{init_logging, level_from_verbosity, parse_log_level, LogConfig, LogOutput};
use straitsim::scenario::ScenarioConfig;
use straitsim::simulation::SimulationEngine;

fn cli() -> Command {
    Command::new("straitsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("海峡ウォーゲーム・シミュレーション")
        .long_about(
            "海峡周辺の艦艇・航空機・商船をエージェントとして扱う離散時間シミュレーション\n\
             交戦規定とエスカレーションレベルのもとで哨戒・探知・追尾・攻撃・拿捕を再現します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .required(true)
                .help("シナリオファイル(.yaml)のパス"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: DEBUG, -vv: TRACE)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(parse_log_level)
                .help("ログレベル (trace, debug, info, warn, error)。-v より優先"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .value_parser(|s: &str| s.parse::<LogOutput>())
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(clap::value_parser!(u64))
                .help("乱数シードをシナリオの値から上書き"),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .value_name("FILE")
                .help("終了時のエージェント状態を YAML で書き出す"),
        )
        .arg(
            Arg::new("pace-ms")
                .long("pace-ms")
                .value_name("MILLIS")
                .value_parser(clap::value_parser!(u64))
                .default_value("0")
                .help("1ターンごとの待ち時間（可視化との同期用）"),
        )
}

fn main() {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<Level>("log-level")
        .copied()
        .unwrap_or_else(|| level_from_verbosity(matches.get_count("verbose")));
    let log_config = LogConfig {
        level,
        output: matches.get_one::<LogOutput>("log-output").copied().unwrap_or(LogOutput::Console),
        log_dir: matches
            .get_one::<String>("log-dir")
            .cloned()
            .unwrap_or_else(|| "logs".to_string()),
        ..LogConfig::default()
    };
    let _guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    let Some(path) = matches.get_one::<String>("scenario") else {
        eprintln!("シナリオファイルを指定してください");
        std::process::exit(1);
    };
    let options = RunOptions {
        info_only: matches.get_flag("info"),
        seed: matches.get_one::<u64>("seed").copied(),
        snapshot: matches.get_one::<String>("snapshot").cloned(),
        pace: Duration::from_millis(matches.get_one::<u64>("pace-ms").copied().unwrap_or(0)),
    };

    if let Err(e) = run_scenario(path, options) {
        error!(error = %e, "SIMULATION_FAILED: シミュレーションを中断しました");
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

struct RunOptions {
    info_only: bool,
    seed: Option<u64>,
    snapshot: Option<String>,
    pace: Duration,
}

/// シナリオファイルを読み込んで実行
fn run_scenario(path: &str, options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut scenario = ScenarioConfig::from_file(path)?;
    if let Some(seed) = options.seed {
        scenario.sim.seed = seed;
    }
    scenario.print_summary();
    if options.info_only {
        return Ok(());
    }

    let mut engine = SimulationEngine::from_scenario(&scenario)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let completed = runtime.block_on(drive(&mut engine, options.pace))?;
    if !completed {
        warn!(time = engine.time, "SIMULATION_INTERRUPTED: 中断要求により終了します");
    }

    print_event_summary(&engine);

    if let Some(snapshot) = options.snapshot {
        let yaml = serde_yaml::to_string(&engine.snapshots())?;
        std::fs::write(&snapshot, yaml)?;
        info!(path = %snapshot, "SNAPSHOT_WRITTEN: エージェント状態を書き出しました");
    }
    Ok(())
}

/// 最大時間までターンを進める。Ctrl-C を受けたら false を返す
async fn drive(engine: &mut SimulationEngine, pace: Duration) -> Result<bool, Box<dyn std::error::Error>> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(max_time = engine.max_time(), dt = engine.dt(), "SIMULATION_START: シミュレーション実行開始");
    while !engine.is_finished() {
        if pace.is_zero() {
            tokio::select! {
                biased;
                _ = &mut ctrl_c => return Ok(false),
                _ = tokio::task::yield_now() => {}
            }
        } else {
            tokio::select! {
                biased;
                _ = &mut ctrl_c => return Ok(false),
                _ = tokio::time::sleep(pace) => {}
            }
        }
        engine.step()?;

        if engine.step_count % 100 == 0 {
            let progress = engine.time / engine.max_time() * 100.0;
            info!(
                progress = format!("{:.1}%", progress),
                time = engine.time,
                step = engine.step_count,
                "SIMULATION_PROGRESS: 進行状況"
            );
        }
    }
    info!(
        time = engine.time,
        steps = engine.step_count,
        events = engine.events.len(),
        "SIMULATION_END: シミュレーション完了"
    );
    Ok(true)
}

fn print_event_summary(engine: &SimulationEngine) {
    println!();
    println!("=== イベント集計 (t = {:.2} h) ===", engine.time);
    for (kind, count) in engine.events.counts() {
        println!("  {:<20} {}", kind.label(), count);
    }
    let active = engine.agents.iter().filter(|a| a.is_active()).count();
    println!("  稼働中エージェント: {} / {}", active, engine.agents.len());
}
