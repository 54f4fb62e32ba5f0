use crate::game::{Player, Rink};
use nalgebra::Point2;
use tracing::trace;

/// One render pass per tick. Draw calls arrive in paint order: rink
/// background first, then every player, then the puck on top.
///
/// A failed call aborts the frame; the simulation loop does not retry.
pub trait Renderer {
    /// Clears the frame and updates the camera projection.
    fn begin_frame(&mut self) -> anyhow::Result<()>;

    fn draw_rink(&mut self, rink: &Rink) -> anyhow::Result<()>;

    fn draw_player(&mut self, player: &Player, pos: Point2<f32>) -> anyhow::Result<()>;

    fn draw_puck(&mut self, pos: Point2<f32>) -> anyhow::Result<()>;

    fn end_frame(&mut self) -> anyhow::Result<()>;
}

impl<T> Renderer for Box<T>
where
    T: Renderer + ?Sized,
{
    fn begin_frame(&mut self) -> anyhow::Result<()> {
        self.as_mut().begin_frame()
    }

    fn draw_rink(&mut self, rink: &Rink) -> anyhow::Result<()> {
        self.as_mut().draw_rink(rink)
    }

    fn draw_player(&mut self, player: &Player, pos: Point2<f32>) -> anyhow::Result<()> {
        self.as_mut().draw_player(player, pos)
    }

    fn draw_puck(&mut self, pos: Point2<f32>) -> anyhow::Result<()> {
        self.as_mut().draw_puck(pos)
    }

    fn end_frame(&mut self) -> anyhow::Result<()> {
        self.as_mut().end_frame()
    }
}

/// Headless renderer that writes each frame to the tracing output.
pub struct TraceRenderer;

impl Renderer for TraceRenderer {
    fn begin_frame(&mut self) -> anyhow::Result<()> {
        trace!("frame start");
        Ok(())
    }

    fn draw_rink(&mut self, rink: &Rink) -> anyhow::Result<()> {
        trace!("rink {}x{}", rink.width, rink.height);
        Ok(())
    }

    fn draw_player(&mut self, player: &Player, pos: Point2<f32>) -> anyhow::Result<()> {
        trace!(
            "player {} ({}) at ({:.2}, {:.2}) facing {:.2}",
            player.player_number,
            player.side,
            pos.x,
            pos.y,
            player.facing
        );
        Ok(())
    }

    fn draw_puck(&mut self, pos: Point2<f32>) -> anyhow::Result<()> {
        trace!("puck at ({:.2}, {:.2})", pos.x, pos.y);
        Ok(())
    }

    fn end_frame(&mut self) -> anyhow::Result<()> {
        trace!("frame end");
        Ok(())
    }
}

/// Renderer that draws nothing. Used in tests.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn begin_frame(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn draw_rink(&mut self, _rink: &Rink) -> anyhow::Result<()> {
        Ok(())
    }

    fn draw_player(&mut self, _player: &Player, _pos: Point2<f32>) -> anyhow::Result<()> {
        Ok(())
    }

    fn draw_puck(&mut self, _pos: Point2<f32>) -> anyhow::Result<()> {
        Ok(())
    }

    fn end_frame(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
