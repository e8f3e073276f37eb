//! Headless demo: fade a node in, reverse halfway, then let it finish.

use anyhow::Result;
use vexel_animation::{Animation, PlayState, SampleEffect, Timeline};

const FRAME_MS: f64 = 1000.0 / 60.0;

fn main() -> Result<()> {
    let timeline = Timeline::new();

    let effect = SampleEffect::new("hero", 600.0).with_range(0.0, 1.0);
    let probe = effect.probe();
    let animation = Animation::new(Box::new(effect), &timeline);
    animation.set_onfinish(|event| {
        println!(
            "finished: {} at local time {:?}",
            event.target(),
            event.current_time()
        );
    });

    animation.play()?;

    let mut frame_time = 0.0;
    for frame in 0..240 {
        timeline.tick(frame_time);
        if timeline.needs_redraw() {
            timeline.clear_dirty();
        }
        if frame % 10 == 0 {
            println!(
                "t={frame_time:7.2}ms opacity={:.3} state={}",
                probe.get(),
                animation.play_state()
            );
        }
        // Turn around once, a third of the way through.
        if frame == 12 {
            animation.reverse()?;
            animation.set_current_time(500.0);
        }
        if animation.play_state() == PlayState::Finished {
            break;
        }
        frame_time += FRAME_MS;
    }

    for event in timeline.drain_events() {
        println!("event: {event:?}");
    }
    Ok(())
}
