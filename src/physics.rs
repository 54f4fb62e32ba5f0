use nalgebra::{Point2, Unit, UnitVector2, Vector2};
use smallvec::SmallVec;

/// Stable handle to a body registered in a [RigidBodyWorld].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BodyHandle(pub(crate) usize);

/// Everything needed to register a new dynamic circle body.
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub pos: Point2<f32>,
    pub radius: f32,
    pub mass: f32,
    pub linear_damping: f32,
    pub restitution: f32,
}

/// The rigid-body engine surface consumed by the simulation loop.
///
/// The loop steps the world twice per tick with different iteration budgets
/// and clears accumulated forces after each step. Entities register their
/// bodies at construction time and only ever query or push forces through
/// their handle; they never step the world themselves.
pub trait RigidBodyWorld {
    fn create_body(&mut self, def: BodyDef) -> BodyHandle;

    /// Adds a static boundary half-plane. The normal points into the playable area.
    fn add_wall(&mut self, point: Point2<f32>, normal: UnitVector2<f32>);

    /// Accumulates a force on a body. Not applied until the next step.
    fn apply_force(&mut self, body: BodyHandle, force: Vector2<f32>);

    fn position(&self, body: BodyHandle) -> Point2<f32>;

    fn linear_velocity(&self, body: BodyHandle) -> Vector2<f32>;

    /// Moves a body without collision response and replaces its velocity.
    fn teleport(&mut self, body: BodyHandle, pos: Point2<f32>, velocity: Vector2<f32>);

    /// Advances all bodies by `time`, then resolves contacts over the given
    /// velocity and position solver budgets.
    fn step(&mut self, time: f32, velocity_iterations: u32, position_iterations: u32);

    fn clear_forces(&mut self);
}

impl<T: RigidBodyWorld + ?Sized> RigidBodyWorld for Box<T> {
    fn create_body(&mut self, def: BodyDef) -> BodyHandle {
        self.as_mut().create_body(def)
    }

    fn add_wall(&mut self, point: Point2<f32>, normal: UnitVector2<f32>) {
        self.as_mut().add_wall(point, normal)
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vector2<f32>) {
        self.as_mut().apply_force(body, force)
    }

    fn position(&self, body: BodyHandle) -> Point2<f32> {
        self.as_ref().position(body)
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vector2<f32> {
        self.as_ref().linear_velocity(body)
    }

    fn teleport(&mut self, body: BodyHandle, pos: Point2<f32>, velocity: Vector2<f32>) {
        self.as_mut().teleport(body, pos, velocity)
    }

    fn step(&mut self, time: f32, velocity_iterations: u32, position_iterations: u32) {
        self.as_mut().step(time, velocity_iterations, position_iterations)
    }

    fn clear_forces(&mut self) {
        self.as_mut().clear_forces()
    }
}

#[derive(Debug, Clone)]
struct Body {
    pos: Point2<f32>,
    linear_velocity: Vector2<f32>,
    force: Vector2<f32>,
    radius: f32,
    inv_mass: f32,
    linear_damping: f32,
    restitution: f32,
    idle_steps: u32,
    sleeping: bool,
}

enum Contact {
    BodyWall {
        body: usize,
        overlap: f32,
        normal: UnitVector2<f32>,
    },
    /// Normal points from `b` towards `a`.
    BodyBody {
        a: usize,
        b: usize,
        overlap: f32,
        normal: UnitVector2<f32>,
    },
}

type ContactList = SmallVec<[Contact; 16]>;

const POSITION_CORRECTION: f32 = 0.2;
const SLEEP_LINEAR_VELOCITY: f32 = 0.01;
const SLEEP_STEPS: u32 = 60;

/// A 2D top-down rigid-body world: dynamic circles inside static half-plane
/// boundaries, with iterative impulse and penetration solvers.
pub struct World {
    gravity: Vector2<f32>,
    allow_sleeping: bool,
    bodies: Vec<Body>,
    walls: Vec<(Point2<f32>, UnitVector2<f32>)>,
}

impl World {
    pub fn new(gravity: Vector2<f32>, allow_sleeping: bool) -> Self {
        World {
            gravity,
            allow_sleeping,
            bodies: Vec::new(),
            walls: Vec::new(),
        }
    }

    pub fn is_sleeping(&self, body: BodyHandle) -> bool {
        self.bodies[body.0].sleeping
    }

    fn find_contacts(&self) -> ContactList {
        let mut contacts = ContactList::new();
        for (i, body) in self.bodies.iter().enumerate() {
            for (point, normal) in self.walls.iter() {
                let distance = (body.pos - point).dot(normal);
                if distance < body.radius {
                    contacts.push(Contact::BodyWall {
                        body: i,
                        overlap: body.radius - distance,
                        normal: *normal,
                    });
                }
            }
        }
        for i in 0..self.bodies.len() {
            for j in i + 1..self.bodies.len() {
                let diff = self.bodies[i].pos - self.bodies[j].pos;
                let radius_sum = self.bodies[i].radius + self.bodies[j].radius;
                let distance = diff.norm();
                if distance < radius_sum {
                    let normal = if distance > f32::EPSILON {
                        Unit::new_unchecked(diff.unscale(distance))
                    } else {
                        Vector2::x_axis()
                    };
                    contacts.push(Contact::BodyBody {
                        a: i,
                        b: j,
                        overlap: radius_sum - distance,
                        normal,
                    });
                }
            }
        }
        contacts
    }

    fn resolve_velocity(&mut self, contact: &Contact) {
        match *contact {
            Contact::BodyWall { body, normal, .. } => {
                let body = &mut self.bodies[body];
                let approach = body.linear_velocity.dot(&normal);
                if approach < 0.0 {
                    body.linear_velocity -= normal.scale((1.0 + body.restitution) * approach);
                    body.wake();
                }
            }
            Contact::BodyBody { a, b, normal, .. } => {
                let inv_mass_sum = self.bodies[a].inv_mass + self.bodies[b].inv_mass;
                if inv_mass_sum == 0.0 {
                    return;
                }
                let restitution = self.bodies[a].restitution.min(self.bodies[b].restitution);
                let relative = self.bodies[a].linear_velocity - self.bodies[b].linear_velocity;
                let approach = relative.dot(&normal);
                if approach < 0.0 {
                    let impulse = normal.scale(-(1.0 + restitution) * approach / inv_mass_sum);
                    let inv_a = self.bodies[a].inv_mass;
                    let inv_b = self.bodies[b].inv_mass;
                    self.bodies[a].linear_velocity += impulse.scale(inv_a);
                    self.bodies[b].linear_velocity -= impulse.scale(inv_b);
                    self.bodies[a].wake();
                    self.bodies[b].wake();
                }
            }
        }
    }

    fn resolve_position(&mut self, contact: &Contact) {
        match *contact {
            Contact::BodyWall {
                body,
                overlap,
                normal,
            } => {
                self.bodies[body].pos += normal.scale(overlap * POSITION_CORRECTION);
            }
            Contact::BodyBody {
                a,
                b,
                overlap,
                normal,
            } => {
                let inv_mass_sum = self.bodies[a].inv_mass + self.bodies[b].inv_mass;
                if inv_mass_sum == 0.0 {
                    return;
                }
                let correction = normal.scale(overlap * POSITION_CORRECTION / inv_mass_sum);
                let inv_a = self.bodies[a].inv_mass;
                let inv_b = self.bodies[b].inv_mass;
                self.bodies[a].pos += correction.scale(inv_a);
                self.bodies[b].pos -= correction.scale(inv_b);
            }
        }
    }

    fn update_sleep_counters(&mut self) {
        for body in self.bodies.iter_mut() {
            if body.linear_velocity.norm_squared()
                < SLEEP_LINEAR_VELOCITY * SLEEP_LINEAR_VELOCITY
            {
                body.idle_steps += 1;
                if body.idle_steps >= SLEEP_STEPS {
                    body.sleeping = true;
                    body.linear_velocity = Vector2::zeros();
                }
            } else {
                body.wake();
            }
        }
    }
}

impl Body {
    fn wake(&mut self) {
        self.sleeping = false;
        self.idle_steps = 0;
    }
}

impl RigidBodyWorld for World {
    fn create_body(&mut self, def: BodyDef) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len());
        self.bodies.push(Body {
            pos: def.pos,
            linear_velocity: Vector2::zeros(),
            force: Vector2::zeros(),
            radius: def.radius,
            inv_mass: if def.mass > 0.0 { 1.0 / def.mass } else { 0.0 },
            linear_damping: def.linear_damping,
            restitution: def.restitution,
            idle_steps: 0,
            sleeping: false,
        });
        handle
    }

    fn add_wall(&mut self, point: Point2<f32>, normal: UnitVector2<f32>) {
        self.walls.push((point, normal));
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vector2<f32>) {
        let body = &mut self.bodies[body.0];
        body.force += force;
        body.wake();
    }

    fn position(&self, body: BodyHandle) -> Point2<f32> {
        self.bodies[body.0].pos
    }

    fn linear_velocity(&self, body: BodyHandle) -> Vector2<f32> {
        self.bodies[body.0].linear_velocity
    }

    fn teleport(&mut self, body: BodyHandle, pos: Point2<f32>, velocity: Vector2<f32>) {
        let body = &mut self.bodies[body.0];
        body.pos = pos;
        body.linear_velocity = velocity;
        body.wake();
    }

    fn step(&mut self, time: f32, velocity_iterations: u32, position_iterations: u32) {
        let gravity = self.gravity;
        for body in self.bodies.iter_mut() {
            if body.sleeping {
                continue;
            }
            body.linear_velocity += (body.force.scale(body.inv_mass) + gravity).scale(time);
            body.linear_velocity
                .scale_mut(1.0 / (1.0 + body.linear_damping * time));
            body.pos += body.linear_velocity.scale(time);
        }
        for _ in 0..velocity_iterations {
            let contacts = self.find_contacts();
            if contacts.is_empty() {
                break;
            }
            for contact in contacts.iter() {
                self.resolve_velocity(contact);
            }
        }
        for _ in 0..position_iterations {
            let contacts = self.find_contacts();
            if contacts.is_empty() {
                break;
            }
            for contact in contacts.iter() {
                self.resolve_position(contact);
            }
        }
        if self.allow_sleeping {
            self.update_sleep_counters();
        }
    }

    fn clear_forces(&mut self) {
        for body in self.bodies.iter_mut() {
            body.force = Vector2::zeros();
        }
    }
}

pub(crate) fn limit_vector_length(v: &Vector2<f32>, max_len: f32) -> Vector2<f32> {
    let norm = v.norm();
    let mut res = v.clone_owned();
    if norm > max_len {
        res.scale_mut(max_len / norm);
    }
    res
}
