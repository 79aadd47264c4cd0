use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;

use robogrid::{tokenize, LevelDefinition, Move, MoveObserver, Robot, Scene};

/// Plays a robot program such as `left(2) up(1)` on a level.
#[derive(Parser, Debug)]
#[command(name = "robogrid")]
#[command(about = "Play a robot program on a grid level")]
struct Args {
    /// Level file (JSON); the built-in 5x5 level is used when omitted
    #[arg(short, long)]
    level: Option<PathBuf>,

    /// Program file; the program is read from stdin when omitted
    program: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let level = match &args.level {
        Some(path) => LevelDefinition::load(path)?,
        None => LevelDefinition::default(),
    };

    let source = match &args.program {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            source
        }
    };

    let print_move: MoveObserver = Box::new(|mv: &Move, _: &Robot| println!("  {}", mv));
    let scene = Scene::with_move_observers(&level, vec![print_move])?;
    scene.on_status_change(|_, new_status, old_status| {
        println!("Program {} -> {}", old_status, new_status);
    });
    scene.on_wall_hit(|mv| println!("Bump! There is a wall at {}", mv.to));
    scene.on_level_complete(|finish| {
        println!("Well done! The robot reached the finish at {}", finish);
    });

    println!(
        "Level '{}': {}x{} grid",
        level.name,
        scene.bounds().width(),
        scene.bounds().height()
    );
    for entity in scene.entities() {
        println!("  {:?} at {} ({})", entity.kind, entity.position, entity.sprite);
    }
    println!("Found {} instructions in the program", tokenize(&source).len());

    match scene.run_program(&source)? {
        Some(mut handle) => {
            let status = tokio::select! {
                result = &mut handle => result?,
                _ = tokio::signal::ctrl_c() => {
                    scene.stop_program();
                    handle.await?
                }
            };
            println!("Program ended: {}", status);
        }
        None => println!("Nothing to do: write commands like left(2) or up(1)"),
    }

    println!("The robot is at {}", scene.robot_position());
    if !scene.is_level_complete() {
        println!("The finish at {} has not been reached yet", scene.finish().pos());
    }

    Ok(())
}
