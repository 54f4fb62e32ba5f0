use std::env;
use std::path::Path;

// INI Crate For configuration
use ini::Ini;
use ini::Properties;

use slapshot::game::PhysicsConfiguration;
use slapshot::input::StaticControllerRegistry;
use slapshot::render::TraceRenderer;
use slapshot::GameConfiguration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        &args[1]
    } else {
        "config.ini"
    };

    // Load configuration (if exists)
    let conf = if Path::new(config_path).exists() {
        Ini::load_from_file(config_path)?
    } else {
        Ini::new()
    };

    fn get_optional<U, F: FnOnce(&str) -> U>(
        section: Option<&Properties>,
        property: &str,
        default: U,
        f: F,
    ) -> U {
        section.and_then(|x| x.get(property)).map_or(default, f)
    }

    // Game
    let game_section = conf.section(Some("Game"));
    let log_name = get_optional(game_section, "log_name", String::from("slapshot.log"), |x| {
        String::from(x)
    });
    let controllers = get_optional(game_section, "controllers", 2, |x| {
        x.parse::<usize>().unwrap()
    });
    let ai_players_home = get_optional(game_section, "ai_home", 1, |x| {
        x.parse::<usize>().unwrap()
    });
    let ai_players_away = get_optional(game_section, "ai_away", 1, |x| {
        x.parse::<usize>().unwrap()
    });

    // Rink
    let rink_section = conf.section(Some("Rink"));
    let rink_width = get_optional(rink_section, "width", 61.0, |x| x.parse::<f32>().unwrap());
    let rink_height = get_optional(rink_section, "height", 30.0, |x| x.parse::<f32>().unwrap());

    // Physics
    let physics_section = conf.section(Some("Physics"));
    let max_player_speed = get_optional(physics_section, "max_player_speed", 8.0, |x| {
        x.parse::<f32>().unwrap()
    });
    let player_acceleration = get_optional(physics_section, "player_acceleration", 20.0, |x| {
        x.parse::<f32>().unwrap()
    });
    let player_deceleration = get_optional(physics_section, "player_deceleration", 30.0, |x| {
        x.parse::<f32>().unwrap()
    });
    let player_turning = get_optional(physics_section, "player_turning", 6.0, |x| {
        x.parse::<f32>().unwrap()
    });
    let puck_rink_friction = get_optional(physics_section, "puck_rink_friction", 0.05, |x| {
        x.parse::<f32>().unwrap()
    });
    let player_mass = get_optional(physics_section, "player_mass", 80.0, |x| {
        x.parse::<f32>().unwrap()
    });
    let puck_mass = get_optional(physics_section, "puck_mass", 0.17, |x| {
        x.parse::<f32>().unwrap()
    });

    let physics_config = PhysicsConfiguration {
        max_player_speed,
        player_acceleration,
        player_deceleration,
        player_turning,
        puck_rink_friction,
        player_mass,
        puck_mass,
    };

    let config = GameConfiguration {
        rink_width,
        rink_height,
        ai_players_home,
        ai_players_away,
    };

    let file_appender = tracing_appender::rolling::daily("log", log_name);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .with_writer(non_blocking)
        .init();

    slapshot::run_game(
        config,
        physics_config,
        Box::new(StaticControllerRegistry::new(controllers)),
        Box::new(TraceRenderer),
    )
    .await
}
