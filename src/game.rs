use crate::input::{ControllerRegistry, InputSourceId};
use crate::physics::{limit_vector_length, BodyDef, BodyHandle, RigidBodyWorld};
use nalgebra::{point, Point2, Vector2};
use std::f32::consts::{PI, TAU};
use std::fmt;
use std::fmt::{Display, Formatter};
use tracing::debug;

/// Team affiliation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => write!(f, "Home"),
            Side::Away => write!(f, "Away"),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PlayerIndex(pub(crate) usize);

impl Display for PlayerIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct AgentIndex(pub(crate) usize);

/// A desired movement direction for one tick, not yet applied as a force.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Intent {
    pub heading: Vector2<f32>,
}

impl Intent {
    pub fn neutral() -> Self {
        Intent {
            heading: Vector2::zeros(),
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.heading.norm_squared() < f32::EPSILON
    }
}

/// Movement tuning used when converting control intent into forces.
#[derive(Debug, Clone)]
pub struct PhysicsConfiguration {
    /// Top skating speed in meters per second.
    pub max_player_speed: f32,
    pub player_acceleration: f32,
    pub player_deceleration: f32,
    /// Turn rate of the facing direction in radians per second.
    pub player_turning: f32,
    pub puck_rink_friction: f32,
    pub player_mass: f32,
    pub puck_mass: f32,
}

impl Default for PhysicsConfiguration {
    fn default() -> Self {
        Self {
            max_player_speed: 8.0,
            player_acceleration: 20.0,
            player_deceleration: 30.0,
            player_turning: 6.0,
            puck_rink_friction: 0.05,
            player_mass: 80.0,
            puck_mass: 0.17,
        }
    }
}

const PLAYER_LINEAR_DAMPING: f32 = 1.0;

/// Static arena geometry.
///
/// All coordinates are in meters. The X axis runs along the length of the
/// rink with 0.0 at the wall behind the Home net; the Y axis runs along the
/// width. Home players defend the low-X half, Away players the high-X half.
#[derive(Debug, Clone)]
pub struct Rink {
    pub width: f32,
    pub height: f32,
    pub center: Point2<f32>,
}

impl Rink {
    /// Registers the four boundary walls into the world.
    pub fn new(world: &mut dyn RigidBodyWorld, width: f32, height: f32) -> Self {
        world.add_wall(point![0.0, 0.0], Vector2::x_axis());
        world.add_wall(point![0.0, 0.0], Vector2::y_axis());
        world.add_wall(point![width, height], -Vector2::x_axis());
        world.add_wall(point![width, height], -Vector2::y_axis());
        Rink {
            width,
            height,
            center: point![width / 2.0, height / 2.0],
        }
    }

    /// Pure lookup: each side lines up on its own half, lateral slots fanning
    /// out from the center line by player number.
    pub fn player_spawn(&self, side: Side, player_number: usize) -> Point2<f32> {
        let x = match side {
            Side::Home => self.width * 0.25,
            Side::Away => self.width * 0.75,
        };
        let spacing = self.height / 8.0;
        let slot = ((player_number + 1) / 2) as f32;
        let lateral = if player_number % 2 == 0 { slot } else { -slot };
        let y = (self.center.y + lateral * spacing).clamp(spacing, self.height - spacing);
        point![x, y]
    }

    pub fn puck_spawn(&self) -> Point2<f32> {
        self.center
    }
}

/// The single movable puck.
#[derive(Debug, Clone)]
pub struct Puck {
    pub body: BodyHandle,
    spawn: Point2<f32>,
}

impl Puck {
    pub const RADIUS: f32 = 0.125;

    pub fn new(
        world: &mut dyn RigidBodyWorld,
        pos: Point2<f32>,
        config: &PhysicsConfiguration,
    ) -> Self {
        let body = world.create_body(BodyDef {
            pos,
            radius: Puck::RADIUS,
            mass: config.puck_mass,
            linear_damping: config.puck_rink_friction,
            restitution: 0.5,
        });
        Puck { body, spawn: pos }
    }

    /// Per-frame upkeep. Puts the puck back on its spawn point if it ever
    /// ends up outside the rink bounds.
    pub fn update(&mut self, world: &mut dyn RigidBodyWorld, rink: &Rink) {
        let pos = world.position(self.body);
        if pos.x < 0.0 || pos.x > rink.width || pos.y < 0.0 || pos.y > rink.height {
            debug!("Puck left the rink at ({:.2}, {:.2}), re-centering", pos.x, pos.y);
            world.teleport(self.body, self.spawn, Vector2::zeros());
        }
    }
}

/// What drives a player. Exactly one source binds a player for its whole life.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ControlSource {
    Human(InputSourceId),
    Ai(AgentIndex),
}

/// A controllable skater: team side, stable 1-based number, its physical
/// body, and the control source that steers it.
#[derive(Debug, Clone)]
pub struct Player {
    pub side: Side,
    pub player_number: usize,
    pub body: BodyHandle,
    pub control: ControlSource,
    /// Direction the player model faces, in radians.
    pub facing: f32,
    intent: Intent,
}

impl Player {
    pub const RADIUS: f32 = 0.375;

    pub fn new(
        world: &mut dyn RigidBodyWorld,
        player_number: usize,
        side: Side,
        control: ControlSource,
        pos: Point2<f32>,
        config: &PhysicsConfiguration,
    ) -> Self {
        let body = world.create_body(BodyDef {
            pos,
            radius: Player::RADIUS,
            mass: config.player_mass,
            linear_damping: PLAYER_LINEAR_DAMPING,
            restitution: 0.0,
        });
        Player {
            side,
            player_number,
            body,
            control,
            facing: match side {
                Side::Home => 0.0,
                Side::Away => PI,
            },
            intent: Intent::neutral(),
        }
    }

    /// Stores the movement intent an agent computed for this tick. Consumed
    /// by the next [Player::update_movement] call.
    pub fn set_intent(&mut self, intent: Intent) {
        self.intent = intent;
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Translates this frame's control intent into a force on the body.
    ///
    /// Human players sample their controller; AI players consume the intent
    /// set earlier in the same tick. The force is sized so that the next
    /// world step moves the velocity towards the desired one, capped by the
    /// configured acceleration (or deceleration, when steering against the
    /// current motion).
    pub fn update_movement(
        &mut self,
        time: f32,
        world: &mut dyn RigidBodyWorld,
        registry: &dyn ControllerRegistry,
        config: &PhysicsConfiguration,
    ) {
        let intent = match self.control {
            ControlSource::Human(source) => Intent {
                heading: registry.sample(source).movement,
            },
            ControlSource::Ai(_) => self.intent,
        };
        self.intent = Intent::neutral();
        if time <= 0.0 || intent.is_neutral() {
            return;
        }
        let magnitude = intent.heading.norm();
        let direction = intent.heading.unscale(magnitude);
        let desired = direction.scale(config.max_player_speed * magnitude.min(1.0));
        let current = world.linear_velocity(self.body);
        let max_acceleration = if current.dot(&direction) < 0.0 {
            config.player_deceleration
        } else {
            config.player_acceleration
        };
        let correction = limit_vector_length(&(desired - current), max_acceleration * time);
        // The solver integrates force / mass * time, which lands exactly on
        // the capped velocity correction.
        world.apply_force(self.body, correction.scale(config.player_mass / time));
        self.turn_towards(&direction, config.player_turning * time);
    }

    fn turn_towards(&mut self, direction: &Vector2<f32>, max_turn: f32) {
        let target = direction.y.atan2(direction.x);
        let mut diff = target - self.facing;
        while diff > PI {
            diff -= TAU;
        }
        while diff < -PI {
            diff += TAU;
        }
        self.facing += diff.clamp(-max_turn, max_turn);
    }
}
