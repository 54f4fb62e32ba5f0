use crate::ai::SteeringAgent;
use crate::game::{
    AgentIndex, ControlSource, PhysicsConfiguration, Player, PlayerIndex, Puck, Rink, Side,
};
use crate::input::ControllerRegistry;
use crate::physics::{RigidBodyWorld, World};
use crate::render::Renderer;
use crate::GameConfiguration;
use anyhow::Context;
use nalgebra::Vector2;
use std::time::Duration;
use tracing::{debug, info};

/// Minimum time between accepted AI spawn triggers.
pub const AI_SPAWN_DEBOUNCE: f32 = 0.5;

const COARSE_VELOCITY_ITERATIONS: u32 = 3;
const COARSE_POSITION_ITERATIONS: u32 = 3;
const FINE_VELOCITY_ITERATIONS: u32 = 100;
const FINE_POSITION_ITERATIONS: u32 = 100;

/// Edge-triggered AI spawn signals for one tick.
#[derive(Debug, Copy, Clone, Default)]
pub struct SpawnTriggers {
    pub spawn_away_ai: bool,
    pub spawn_home_ai: bool,
}

/// One running simulation session: the physical world, the rink, the puck,
/// the ordered player list and the AI agent arena.
pub struct GameSession {
    world: Box<dyn RigidBodyWorld>,
    physics: PhysicsConfiguration,
    rink: Rink,
    puck: Puck,
    players: Vec<Player>,
    agents: Vec<SteeringAgent>,
    /// Global alternation tracker. Starts at Away so the first assigned
    /// player lands on Home; never resets within a session.
    last_used_side: Side,
    ai_cooldown: f32,
}

impl GameSession {
    /// Builds a session: rink walls into the world, one player per already
    /// connected controller, puck at its spawn point, empty agent arena.
    ///
    /// The world must already be configured the way the session expects it:
    /// no ambient gravity and sleeping disabled, so idle bodies keep
    /// simulating.
    pub fn start(
        mut world: Box<dyn RigidBodyWorld>,
        config: &GameConfiguration,
        physics: PhysicsConfiguration,
        registry: &mut dyn ControllerRegistry,
    ) -> Self {
        info!(
            "Starting session on a {}x{} rink",
            config.rink_width, config.rink_height
        );
        let rink = Rink::new(&mut world, config.rink_width, config.rink_height);
        let mut players = Vec::new();
        let mut last_used_side = Side::Away;
        assign_human_players(
            &mut world,
            &rink,
            &physics,
            registry,
            &mut players,
            &mut last_used_side,
        );
        let puck = Puck::new(&mut world, rink.puck_spawn(), &physics);
        GameSession {
            world,
            physics,
            rink,
            puck,
            players,
            agents: Vec::new(),
            last_used_side,
            ai_cooldown: 0.0,
        }
    }

    /// Advances the session by one frame.
    ///
    /// Fixed order: spawn requests, new-controller binding, coarse physics
    /// step, AI steering, player motion, puck upkeep, fine physics step,
    /// render pass. AI intent and player motion sit strictly between the
    /// two steps so the fine step resolves the freshly applied forces.
    pub fn tick(
        &mut self,
        time: f32,
        triggers: SpawnTriggers,
        registry: &mut dyn ControllerRegistry,
        renderer: &mut dyn Renderer,
    ) -> anyhow::Result<()> {
        if self.ai_cooldown > 0.0 {
            self.ai_cooldown -= time;
        }
        if triggers.spawn_away_ai && self.ai_cooldown <= 0.0 {
            self.ai_cooldown = AI_SPAWN_DEBOUNCE;
            self.spawn_ai_player(Side::Away);
        }
        if triggers.spawn_home_ai && self.ai_cooldown <= 0.0 {
            self.ai_cooldown = AI_SPAWN_DEBOUNCE;
            self.spawn_ai_player(Side::Home);
        }
        if registry.has_new_controllers() {
            assign_human_players(
                &mut self.world,
                &self.rink,
                &self.physics,
                registry,
                &mut self.players,
                &mut self.last_used_side,
            );
        }

        // Coarse step: settles gross collision response cheaply.
        self.world
            .step(time, COARSE_VELOCITY_ITERATIONS, COARSE_POSITION_ITERATIONS);
        self.world.clear_forces();

        let puck_pos = self.world.position(self.puck.body);
        for agent in self.agents.iter() {
            let player = &mut self.players[agent.player.0];
            let agent_pos = self.world.position(player.body);
            player.set_intent(agent.follow(agent_pos, puck_pos));
        }

        for player in self.players.iter_mut() {
            player.update_movement(time, &mut self.world, registry, &self.physics);
        }

        self.puck.update(&mut self.world, &self.rink);

        // Fine step: high iteration budget to resolve the control forces
        // applied above before the frame is drawn.
        self.world
            .step(time, FINE_VELOCITY_ITERATIONS, FINE_POSITION_ITERATIONS);
        self.world.clear_forces();

        renderer.begin_frame()?;
        renderer.draw_rink(&self.rink)?;
        for player in self.players.iter() {
            renderer.draw_player(player, self.world.position(player.body))?;
        }
        renderer.draw_puck(self.world.position(self.puck.body))?;
        renderer.end_frame()?;
        Ok(())
    }

    /// Creates a steering agent and its player in one go; the agent is
    /// constructed already bound to the player slot it will steer.
    pub fn spawn_ai_player(&mut self, side: Side) {
        let agent_index = AgentIndex(self.agents.len());
        let player_index = PlayerIndex(self.players.len());
        let player_number = self.players.len() + 1;
        self.agents.push(SteeringAgent::new(player_index));
        let pos = self.rink.player_spawn(side, player_number);
        info!("AI player {} joined {}", player_number, side);
        self.players.push(Player::new(
            &mut self.world,
            player_number,
            side,
            ControlSource::Ai(agent_index),
            pos,
            &self.physics,
        ));
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn agents(&self) -> &[SteeringAgent] {
        &self.agents
    }

    pub fn rink(&self) -> &Rink {
        &self.rink
    }

    pub fn puck(&self) -> &Puck {
        &self.puck
    }

    pub fn world(&self) -> &dyn RigidBodyWorld {
        self.world.as_ref()
    }
}

/// Binds every not-yet-bound input source to a new player, flipping the
/// side tracker per assignment and numbering players by list size. Shared
/// by session start and in-session controller attachment; a call with no
/// unbound sources changes nothing.
fn assign_human_players(
    world: &mut dyn RigidBodyWorld,
    rink: &Rink,
    physics: &PhysicsConfiguration,
    registry: &dyn ControllerRegistry,
    players: &mut Vec<Player>,
    last_used_side: &mut Side,
) {
    debug!(
        "Checking {} input sources for unbound controllers",
        registry.input_sources().len()
    );
    for &source in registry.input_sources() {
        let already_bound = players
            .iter()
            .any(|p| p.control == ControlSource::Human(source));
        if already_bound {
            continue;
        }
        *last_used_side = last_used_side.other();
        let player_number = players.len() + 1;
        let pos = rink.player_spawn(*last_used_side, player_number);
        info!(
            "Player {} joined {} with controller {:?}",
            player_number, last_used_side, source
        );
        players.push(Player::new(
            world,
            player_number,
            *last_used_side,
            ControlSource::Human(source),
            pos,
            physics,
        ));
    }
}

/// A whole game: the session plus the controller and renderer collaborators
/// that outlive it. Ticking before [HockeyGame::start] is a state error.
pub struct HockeyGame {
    config: GameConfiguration,
    physics: PhysicsConfiguration,
    registry: Box<dyn ControllerRegistry>,
    renderer: Box<dyn Renderer>,
    session: Option<GameSession>,
}

impl HockeyGame {
    pub fn new(
        config: GameConfiguration,
        physics: PhysicsConfiguration,
        registry: Box<dyn ControllerRegistry>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        HockeyGame {
            config,
            physics,
            registry,
            renderer,
            session: None,
        }
    }

    /// Constructs the world (zero gravity, sleeping disabled) and starts
    /// the session in it. Restarting replaces the previous session.
    pub fn start(&mut self) {
        let world = Box::new(World::new(Vector2::zeros(), false));
        self.session = Some(GameSession::start(
            world,
            &self.config,
            self.physics.clone(),
            self.registry.as_mut(),
        ));
    }

    pub fn tick(&mut self, time: f32, triggers: SpawnTriggers) -> anyhow::Result<()> {
        let session = self
            .session
            .as_mut()
            .context("tick called before session start")?;
        session.tick(
            time,
            triggers,
            self.registry.as_mut(),
            self.renderer.as_mut(),
        )
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }
}

/// Runs a game at a fixed 100 Hz cadence, raising spawn triggers until the
/// configured AI head-counts are reached.
pub async fn run_game(
    config: GameConfiguration,
    physics: PhysicsConfiguration,
    registry: Box<dyn ControllerRegistry>,
    renderer: Box<dyn Renderer>,
) -> anyhow::Result<()> {
    let ai_home = config.ai_players_home;
    let ai_away = config.ai_players_away;
    let mut game = HockeyGame::new(config, physics, registry, renderer);
    game.start();
    let mut tick_timer = tokio::time::interval(Duration::from_millis(10));
    loop {
        tick_timer.tick().await;
        let (home, away) = game.session().map_or((0, 0), ai_head_count);
        let triggers = SpawnTriggers {
            spawn_away_ai: away < ai_away,
            spawn_home_ai: home < ai_home,
        };
        game.tick(0.01, triggers)?;
    }
}

fn ai_head_count(session: &GameSession) -> (usize, usize) {
    let mut home = 0;
    let mut away = 0;
    for player in session.players() {
        if let ControlSource::Ai(_) = player.control {
            match player.side {
                Side::Home => home += 1,
                Side::Away => away += 1,
            }
        }
    }
    (home, away)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ControlInput, InputSourceId, StaticControllerRegistry};
    use crate::physics::{BodyDef, BodyHandle};
    use crate::render::NullRenderer;
    use nalgebra::{vector, Point2, UnitVector2};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct ScriptedRegistry {
        sources: Vec<InputSourceId>,
        new_flag: bool,
        movement: Vector2<f32>,
    }

    impl ScriptedRegistry {
        fn new(count: usize) -> Self {
            Self {
                sources: (0..count).map(InputSourceId).collect(),
                new_flag: false,
                movement: Vector2::zeros(),
            }
        }

        fn attach(&mut self) {
            self.sources.push(InputSourceId(self.sources.len()));
            self.new_flag = true;
        }
    }

    impl ControllerRegistry for ScriptedRegistry {
        fn has_new_controllers(&mut self) -> bool {
            std::mem::take(&mut self.new_flag)
        }

        fn input_sources(&self) -> &[InputSourceId] {
            &self.sources
        }

        fn sample(&self, _source: InputSourceId) -> ControlInput {
            ControlInput {
                movement: self.movement,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum WorldCall {
        Step {
            velocity_iterations: u32,
            position_iterations: u32,
        },
        ClearForces,
        ApplyForce,
    }

    struct RecordingWorld {
        inner: World,
        calls: Rc<RefCell<Vec<WorldCall>>>,
    }

    impl RigidBodyWorld for RecordingWorld {
        fn create_body(&mut self, def: BodyDef) -> BodyHandle {
            self.inner.create_body(def)
        }

        fn add_wall(&mut self, point: Point2<f32>, normal: UnitVector2<f32>) {
            self.inner.add_wall(point, normal)
        }

        fn apply_force(&mut self, body: BodyHandle, force: Vector2<f32>) {
            self.calls.borrow_mut().push(WorldCall::ApplyForce);
            self.inner.apply_force(body, force)
        }

        fn position(&self, body: BodyHandle) -> Point2<f32> {
            self.inner.position(body)
        }

        fn linear_velocity(&self, body: BodyHandle) -> Vector2<f32> {
            self.inner.linear_velocity(body)
        }

        fn teleport(&mut self, body: BodyHandle, pos: Point2<f32>, velocity: Vector2<f32>) {
            self.inner.teleport(body, pos, velocity)
        }

        fn step(&mut self, time: f32, velocity_iterations: u32, position_iterations: u32) {
            self.calls.borrow_mut().push(WorldCall::Step {
                velocity_iterations,
                position_iterations,
            });
            self.inner.step(time, velocity_iterations, position_iterations)
        }

        fn clear_forces(&mut self) {
            self.calls.borrow_mut().push(WorldCall::ClearForces);
            self.inner.clear_forces()
        }
    }

    fn start_session(registry: &mut ScriptedRegistry) -> GameSession {
        let world = Box::new(World::new(Vector2::zeros(), false));
        GameSession::start(
            world,
            &GameConfiguration::default(),
            PhysicsConfiguration::default(),
            registry,
        )
    }

    #[test]
    fn controllers_get_sequential_numbers_and_alternating_sides() {
        let mut registry = ScriptedRegistry::new(4);
        let session = start_session(&mut registry);
        let numbers: Vec<usize> = session.players().iter().map(|p| p.player_number).collect();
        let sides: Vec<Side> = session.players().iter().map(|p| p.side).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(sides, vec![Side::Home, Side::Away, Side::Home, Side::Away]);
    }

    #[test]
    fn already_bound_sources_are_not_assigned_twice() {
        let mut registry = ScriptedRegistry::new(2);
        let mut session = start_session(&mut registry);
        assert_eq!(session.players().len(), 2);

        // Spurious "new controller" report with no actually-new sources.
        registry.new_flag = true;
        session
            .tick(0.016, SpawnTriggers::default(), &mut registry, &mut NullRenderer)
            .unwrap();
        assert_eq!(session.players().len(), 2);

        // A genuinely new controller continues the global alternation.
        registry.attach();
        session
            .tick(0.016, SpawnTriggers::default(), &mut registry, &mut NullRenderer)
            .unwrap();
        assert_eq!(session.players().len(), 3);
        assert_eq!(session.players()[2].player_number, 3);
        assert_eq!(session.players()[2].side, Side::Home);
    }

    #[test]
    fn ai_spawn_is_debounced() {
        let mut registry = ScriptedRegistry::new(0);
        let mut session = start_session(&mut registry);
        let triggers = SpawnTriggers {
            spawn_away_ai: true,
            spawn_home_ai: false,
        };

        session
            .tick(0.02, triggers, &mut registry, &mut NullRenderer)
            .unwrap();
        assert_eq!(session.agents().len(), 1);

        // Held trigger within the debounce window spawns nothing more.
        for _ in 0..10 {
            session
                .tick(0.02, triggers, &mut registry, &mut NullRenderer)
                .unwrap();
        }
        assert_eq!(session.agents().len(), 1);

        // Once the cooldown has elapsed, exactly one more appears.
        for _ in 0..20 {
            session
                .tick(0.02, triggers, &mut registry, &mut NullRenderer)
                .unwrap();
        }
        assert_eq!(session.agents().len(), 2);
    }

    #[test]
    fn tick_steps_twice_with_control_updates_in_between() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let world = Box::new(RecordingWorld {
            inner: World::new(Vector2::zeros(), false),
            calls: calls.clone(),
        });
        let mut registry = ScriptedRegistry::new(1);
        registry.movement = vector![1.0, 0.0];
        let mut session = GameSession::start(
            world,
            &GameConfiguration::default(),
            PhysicsConfiguration::default(),
            &mut registry,
        );
        calls.borrow_mut().clear();

        session
            .tick(0.01, SpawnTriggers::default(), &mut registry, &mut NullRenderer)
            .unwrap();

        let calls = calls.borrow();
        assert_eq!(
            calls[0],
            WorldCall::Step {
                velocity_iterations: COARSE_VELOCITY_ITERATIONS,
                position_iterations: COARSE_POSITION_ITERATIONS,
            }
        );
        assert_eq!(calls[1], WorldCall::ClearForces);
        assert_eq!(
            calls[calls.len() - 2],
            WorldCall::Step {
                velocity_iterations: FINE_VELOCITY_ITERATIONS,
                position_iterations: FINE_POSITION_ITERATIONS,
            }
        );
        assert_eq!(calls[calls.len() - 1], WorldCall::ClearForces);

        // The moving player's force lands strictly between the two steps.
        let between = &calls[2..calls.len() - 2];
        assert!(!between.is_empty());
        assert!(between.iter().all(|c| *c == WorldCall::ApplyForce));
    }

    #[test]
    fn two_controllers_then_one_away_ai() {
        let mut registry = ScriptedRegistry::new(2);
        let mut session = start_session(&mut registry);
        assert_eq!(session.players().len(), 2);
        assert_eq!(session.players()[0].side, Side::Home);
        assert_eq!(session.players()[1].side, Side::Away);

        let triggers = SpawnTriggers {
            spawn_away_ai: true,
            spawn_home_ai: false,
        };
        session
            .tick(0.016, triggers, &mut registry, &mut NullRenderer)
            .unwrap();

        assert_eq!(session.players().len(), 3);
        let ai = &session.players()[2];
        assert_eq!(ai.player_number, 3);
        assert_eq!(ai.side, Side::Away);
        assert_eq!(ai.control, ControlSource::Ai(AgentIndex(0)));
        assert_eq!(session.agents().len(), 1);
        assert_eq!(session.agents()[0].player, PlayerIndex(2));
    }

    #[test]
    fn ai_players_chase_the_puck() {
        let mut registry = ScriptedRegistry::new(0);
        let mut session = start_session(&mut registry);
        session.spawn_ai_player(Side::Home);
        let body = session.players()[0].body;
        let start_distance =
            (session.world().position(body) - session.rink().puck_spawn()).norm();

        for _ in 0..200 {
            session
                .tick(0.01, SpawnTriggers::default(), &mut registry, &mut NullRenderer)
                .unwrap();
        }
        let end_distance = (session.world().position(body) - session.rink().puck_spawn()).norm();
        assert!(
            end_distance < start_distance,
            "AI did not close in on the puck: {} -> {}",
            start_distance,
            end_distance
        );
    }

    #[test]
    fn ticking_before_start_is_an_error() {
        let mut game = HockeyGame::new(
            GameConfiguration::default(),
            PhysicsConfiguration::default(),
            Box::new(StaticControllerRegistry::new(0)),
            Box::new(NullRenderer),
        );
        assert!(game.tick(0.01, SpawnTriggers::default()).is_err());

        // Zero connected controllers is a valid, playerless session.
        game.start();
        assert!(game.tick(0.01, SpawnTriggers::default()).is_ok());
        assert_eq!(game.session().unwrap().players().len(), 0);
    }
}
