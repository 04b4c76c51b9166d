use anyhow::Context;
use colored::Colorize;
use dockpipe_build::BuildError;
use dockpipe_core::Instruction;
use std::io::Read;

pub fn handle(file: &str, json: bool) -> anyhow::Result<()> {
    let content = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("標準入力を読み込めません")?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Dockerfileを読み込めません: {}", file))?
    };

    let model = dockpipe_core::parse(&content).map_err(BuildError::from)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&model)?);
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{}: {}個の命令, {}個のステージ",
            file,
            model.len(),
            model.stages().len()
        )
        .bold()
    );

    for directive in model.directives() {
        println!("  {}", directive.render().dimmed());
    }

    for stage in model.stages() {
        println!();
        let label = match &stage.name {
            Some(name) => format!("ステージ {} ({})", stage.index, name),
            None => format!("ステージ {}", stage.index),
        };
        println!("{} ← {}", label.green().bold(), stage.base_image.cyan());
        for instruction in model.stage_instructions(stage) {
            print_instruction(instruction);
        }
    }

    Ok(())
}

fn print_instruction(instruction: &Instruction) {
    let lines = instruction.lines();
    let position = if lines.start == lines.end {
        format!("{}", lines.start)
    } else {
        format!("{}-{}", lines.start, lines.end)
    };
    let rendered = instruction.render();
    let arguments = rendered.split_once(' ').map(|(_, rest)| rest).unwrap_or_default();
    println!(
        "  {:>7}  {} {}",
        position.dimmed(),
        instruction.keyword().to_string().cyan(),
        arguments
    );
}
