/// Preview: generate and bind quests against the demo world.
///
/// Usage: preview [--grammar <path>] [--config <path>] [--seed <n>] [--zones <n>]
///
/// Every zone is a fresh copy of the demo world. For each one the tool
/// binds quests, commits them and prints the resulting quest-givers and
/// targets. Set `RUST_LOG=debug` to watch binding attempts.

use quest_engine::core::commit::CommittedQuest;
use quest_engine::core::populate::QuestPopulate;
use quest_engine::schema::component::Component;
use quest_engine::schema::entity::AreaTile;
use quest_engine::schema::world::{Components, Levels, Naming};
use quest_engine::schema::world_state::WorldState;
use std::process;

fn print_usage() {
    println!("Usage: preview [--grammar <path>] [--config <path>] [--seed <n>] [--zones <n>]");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut grammar_path = None;
    let mut config_path = None;
    let mut seed: u64 = 42;
    let mut zones: u32 = 1;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return;
            }
            "--grammar" if i + 1 < args.len() => {
                i += 1;
                grammar_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--zones" if i + 1 < args.len() => {
                i += 1;
                zones = args[i].parse().unwrap_or(1);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = QuestPopulate::builder().seed(seed);
    if let Some(ref path) = grammar_path {
        builder = builder.grammar_file(path);
    }
    if let Some(ref path) = config_path {
        builder = builder.config_file(path);
    }
    let mut populate = match builder.build() {
        Ok(populate) => populate,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded {} grammar rules", populate.grammar().rules.len());
    println!("Seed: {}\n", seed);

    for n in 0..zones {
        let (mut world, zone) = WorldState::demo();
        let tile = AreaTile { x: n as i32, y: 0 };
        let zone_name = world.zone_name(zone).unwrap_or_default();

        let created = match populate.create_quests_for_zone(&mut world, zone, tile) {
            Ok(created) => created,
            Err(e) => {
                eprintln!("FATAL: {}", e);
                process::exit(2);
            }
        };
        let committed = match populate.add_quest_components(&mut world) {
            Ok(committed) => committed,
            Err(e) => {
                eprintln!("FATAL: {}", e);
                process::exit(2);
            }
        };

        println!(
            "=== Zone {} ({}, tile {},{}): {} quests bound ===",
            n, zone_name, tile.x, tile.y, created
        );
        for quest in &committed {
            print_quest(&world, quest);
        }
        println!();
    }
}

fn print_quest(world: &WorldState, quest: &CommittedQuest) {
    let giver = world.name_of(quest.giver).unwrap_or_default();
    println!(
        "[{:?}] {}, given by {}",
        quest.quest_id,
        quest.motive.as_deref().unwrap_or(&quest.name),
        giver
    );
    for component in world.components(quest.giver) {
        if let Component::QuestGiver(g) = component {
            if g.quest_id == quest.quest_id {
                println!("    \"{}\"", g.description);
            }
        }
    }
    for (kind, target_type, id) in &quest.targets {
        let name = world.name_of(*id).unwrap_or_else(|| format!("{:?}", id));
        let extra: Vec<String> = world
            .components(*id)
            .into_iter()
            .filter_map(|c| match c {
                Component::QuestInfo(info) => Some(format!("asks \"{}\"", info.question)),
                Component::QuestReport(r) => Some(format!(
                    "expects word from {}",
                    world.name_of(r.expect_info_from).unwrap_or_default()
                )),
                Component::ReadText(text) => Some(format!("reads \"{}\"", text)),
                Component::Broken => Some("broken".to_string()),
                _ => None,
            })
            .collect();
        if extra.is_empty() {
            println!("  {:<12} {:<8} {}", kind.to_string(), target_type.name(), name);
        } else {
            println!(
                "  {:<12} {:<8} {} ({})",
                kind.to_string(),
                target_type.name(),
                name,
                extra.join("; ")
            );
        }
    }
}
