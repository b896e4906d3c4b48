//! OpenAgent 命令行入口
//!
//! 交互模式逐行读取任务（`quit` 退出）；`--task` 只运行一次。Ctrl-C 取消当前任务而不退出程序。

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use open_agent::config::load_config;
use open_agent::react::ReactEvent;
use open_agent::{observability, AgentComponents, AgentSession, AgentType, TaskOutput};

#[derive(Parser, Debug)]
#[command(name = "open-agent", about = "Tool-augmented reasoning agent")]
struct Args {
    /// 只运行这一个任务后退出
    #[arg(short, long)]
    task: Option<String>,

    /// 控制策略：react 或 swe（默认取配置）
    #[arg(short, long)]
    agent: Option<AgentType>,

    /// 额外的配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 输出过程事件
    #[arg(short, long)]
    verbose: bool,
}

fn print_event(ev: &ReactEvent) {
    match ev {
        ReactEvent::StepUpdate { step, max_steps } => println!("  [step {}/{}]", step, max_steps),
        ReactEvent::PhaseStarted { phase } => println!("  [phase] {}", phase),
        ReactEvent::ThinkingContent { text } => println!("  Thought: {}", text),
        ReactEvent::ToolCall { tool, args } => println!("  Action: {} {}", tool, args),
        ReactEvent::Observation { preview, .. } => println!("  Observation: {}", preview),
        ReactEvent::ToolFailure { tool, reason } => println!("  Tool {} failed: {}", tool, reason),
        ReactEvent::Recovery { detail, .. } => println!("  {}", detail),
        ReactEvent::Exhausted { iterations } => {
            println!("  Reached {} iterations, summarizing", iterations)
        }
        _ => {}
    }
}

fn print_output(output: &TaskOutput) {
    if output.success {
        println!("\n{}\n", output.result.as_deref().unwrap_or_default());
    } else {
        println!(
            "\nError: {}\n",
            output.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Some(artifacts) = &output.metadata.artifacts {
        for (kind, paths) in artifacts {
            for path in paths {
                println!("  [{}] {}", kind, path);
            }
        }
    }
    if output.metadata.completed == Some(false) {
        if let Some(reason) = &output.metadata.reason {
            println!("  (incomplete: {})", reason);
        }
    }
}

/// 运行一条任务；Ctrl-C 通过取消令牌结束本次运行，程序继续
async fn run_one(session: &mut AgentSession, line: &str) {
    let output = session
        .submit_until(line, async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;
    print_output(&output);
    let usage = session.components().generator.token_usage();
    if usage.total() > 0 {
        println!("  tokens: {} prompt / {} completion", usage.prompt, usage.completion);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    observability::init(if args.verbose { "debug" } else { "info" });

    let cfg = load_config(args.config.clone()).context("Failed to load config")?;
    let workspace = cfg.app.workspace_root();
    std::fs::create_dir_all(&workspace)
        .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;

    let agent_type = args.agent.unwrap_or(cfg.agent.default);
    let components = AgentComponents::from_config(cfg);
    let mut session = AgentSession::new(components, agent_type);

    if args.verbose {
        let (tx, mut rx) = mpsc::unbounded_channel();
        session = session.with_event_tx(tx);
        tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                print_event(&ev);
            }
        });
    }

    if let Some(task) = args.task {
        run_one(&mut session, &task).await;
        return Ok(());
    }

    println!(
        "open-agent ({} mode). Type a task, `agent react|swe` to switch, `quit` to exit.",
        session.agent_type()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        if let Some(kind) = line.strip_prefix("agent ") {
            match kind.parse::<AgentType>() {
                Ok(t) => {
                    session.set_agent_type(t);
                    println!("Switched to {} mode.", t);
                }
                Err(e) => println!("{}", e),
            }
            continue;
        }
        run_one(&mut session, line).await;
    }

    Ok(())
}
