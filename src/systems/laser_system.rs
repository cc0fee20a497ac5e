use crate::gcode_parser::{Command, GCodeParser, feed_to_speed};
use crate::motion::{Planner, SegmentError};
use crate::ring_queue::Consumer;
use crate::Fixed32;

/// What a call to [`LaserSystem::service`] accomplished.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Service {
    /// Input exhausted, nothing left to do until more bytes arrive.
    Idle,
    /// A command was handled; call again.
    Busy,
    /// The segment queue is full. The command is kept and retried on the
    /// next call.
    Stalled,
}

/// Main-loop side of the machine: serial bytes in, planned segments out.
pub struct LaserSystem<'a, const RX: usize, const N: usize> {
    rx: Consumer<'a, u8, RX>,
    parser: GCodeParser,
    planner: Planner<'a, N>,

    feed: Option<Fixed32>,
    pending: Option<Command>,
}

impl<'a, const RX: usize, const N: usize> LaserSystem<'a, RX, N> {
    pub fn new(rx: Consumer<'a, u8, RX>, planner: Planner<'a, N>) -> Self {
        LaserSystem {
            rx,
            parser: GCodeParser::new(),
            planner,
            feed: None,
            pending: None,
        }
    }

    pub fn planner(&self) -> &Planner<'a, N> {
        &self.planner
    }

    /// Last feed rate given on a move, in units per minute.
    pub fn feed(&self) -> Option<Fixed32> {
        self.feed
    }

    /// Handles at most one command.
    ///
    /// A command held back by a full segment queue is retried before any new
    /// byte is read, so a stall leaves the rest of the input in the RX queue.
    pub fn service(&mut self) -> Service {
        if let Some(command) = self.pending.take() {
            return self.dispatch(command);
        }

        while let Some(byte) = self.rx.try_pop() {
            self.parser.feed(byte);

            if let Some(command) = self.parser.next_command() {
                return self.dispatch(command);
            }
        }

        Service::Idle
    }

    fn dispatch(&mut self, command: Command) -> Service {
        match self.process_command(command) {
            Ok(()) => Service::Busy,
            Err(SegmentError::QueueFull) => {
                self.pending = Some(command);
                Service::Stalled
            }
            Err(err) => {
                log::warn!("Dropping {:?}: {}", command, err);
                Service::Busy
            }
        }
    }

    pub fn process_command(&mut self, command: Command) -> Result<(), SegmentError> {
        match command {
            Command::LaserOn => {
                self.planner.enable_laser();
                Ok(())
            }
            Command::LaserOff => {
                self.planner.disable_laser();
                Ok(())
            }
            Command::RapidMove { target } => {
                let target = self.planner.position().resolve(target);
                self.planner.enqueue_rapid(target)
            }
            Command::LinearMove { target, feed } => {
                let speed = self.speed(feed)?;
                let target = self.planner.position().resolve(target);
                self.planner.enqueue_line(target, speed)
            }
            Command::ArcMove {
                direction,
                target,
                center,
                feed,
            } => {
                let speed = self.speed(feed)?;
                let target = self.planner.position().resolve(target);
                self.planner.enqueue_arc(target, center, direction, speed)
            }
        }
    }

    fn speed(&mut self, feed: Option<Fixed32>) -> Result<f32, SegmentError> {
        if feed.is_some() {
            self.feed = feed;
        }

        self.feed
            .map(feed_to_speed)
            .ok_or(SegmentError::InvalidSpeed(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::MachineConfig;
    use crate::hardware::mock::{MockAxis, MockLaser};
    use crate::motion::{self, PlannedPath, PlannedSegment, SegmentQueue};
    use crate::ring_queue::{Producer, RingQueue};
    use crate::Position;

    fn config() -> MachineConfig {
        MachineConfig {
            steps_per_mm: [10.0, 10.0],
            tick_period_us: 100,
            ..Default::default()
        }
    }

    fn send<const RX: usize>(rx: &mut Producer<'_, u8, RX>, text: &str) {
        for byte in text.bytes() {
            rx.try_push(byte).unwrap();
        }
    }

    fn drain<const RX: usize, const N: usize>(system: &mut LaserSystem<'_, RX, N>) {
        while system.service() != Service::Idle {}
    }

    fn line_target(segment: PlannedSegment) -> [i32; 2] {
        match segment.path {
            PlannedPath::Line(line) => line.target,
            PlannedPath::Arc(_) => panic!("expected a line"),
        }
    }

    #[test]
    fn feed_is_modal() {
        let mut rx: RingQueue<u8, 64> = RingQueue::new();
        let mut segments: SegmentQueue<4> = SegmentQueue::new();
        let (mut tx, rx) = rx.split();
        let (producer, mut consumer) = segments.split();
        let mut system = LaserSystem::new(rx, Planner::new(producer, config(), [0, 0]));

        send(&mut tx, "G1 X10 F600\nG1 Y5\n");
        drain(&mut system);

        assert_eq!(system.feed(), Some(Fixed32::from_num(600)));
        assert_eq!(line_target(consumer.try_pop().unwrap()), [100, 0]);
        assert_eq!(line_target(consumer.try_pop().unwrap()), [100, 50]);
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn move_without_any_feed_is_dropped() {
        let mut rx: RingQueue<u8, 64> = RingQueue::new();
        let mut segments: SegmentQueue<4> = SegmentQueue::new();
        let (mut tx, rx) = rx.split();
        let (producer, mut consumer) = segments.split();
        let mut system = LaserSystem::new(rx, Planner::new(producer, config(), [0, 0]));

        send(&mut tx, "G1 X10\nG2 X0 Y10 J5\nG1 X3 F60\n");
        drain(&mut system);

        assert_eq!(line_target(consumer.try_pop().unwrap()), [30, 0]);
        assert_eq!(consumer.try_pop(), None);
        assert_eq!(system.planner().position(), Position::from_num(3.0, 0.0));
    }

    #[test]
    fn laser_commands_apply_to_following_moves() {
        let mut rx: RingQueue<u8, 64> = RingQueue::new();
        let mut segments: SegmentQueue<4> = SegmentQueue::new();
        let (mut tx, rx) = rx.split();
        let (producer, mut consumer) = segments.split();
        let mut system = LaserSystem::new(rx, Planner::new(producer, config(), [0, 0]));

        send(&mut tx, "M1\nG0 X5 Y5\nG1 X6 F300\nM2\nG1 X7\n");
        drain(&mut system);

        let rapid = consumer.try_pop().unwrap();
        let cut = consumer.try_pop().unwrap();
        let travel = consumer.try_pop().unwrap();
        assert_eq!(line_target(rapid), [50, 50]);
        assert!(!rapid.laser);
        assert!(cut.laser);
        assert!(!travel.laser);
        assert!(!system.planner().laser_enabled());
    }

    #[test]
    fn malformed_line_does_not_block_stream() {
        let mut rx: RingQueue<u8, 64> = RingQueue::new();
        let mut segments: SegmentQueue<4> = SegmentQueue::new();
        let (mut tx, rx) = rx.split();
        let (producer, mut consumer) = segments.split();
        let mut system = LaserSystem::new(rx, Planner::new(producer, config(), [0, 0]));

        send(&mut tx, "G9 X\nG1 X2 F600\n");
        drain(&mut system);

        assert_eq!(line_target(consumer.try_pop().unwrap()), [20, 0]);
    }

    #[test]
    fn full_queue_stalls_without_losing_commands() {
        let mut rx: RingQueue<u8, 128> = RingQueue::new();
        let mut segments: SegmentQueue<3> = SegmentQueue::new();
        let (mut tx, rx) = rx.split();
        let (planner, mut rasterizer) = motion::split(
            &mut segments,
            config(),
            MockAxis::default(),
            MockAxis::default(),
            MockLaser::default(),
        );
        let mut system = LaserSystem::new(rx, planner);

        send(&mut tx, "G1 X1 F6000\nG1 X2\nG1 X3\nG1 X4 Y1\n");

        assert_eq!(system.service(), Service::Busy);
        assert_eq!(system.service(), Service::Busy);
        assert_eq!(system.service(), Service::Stalled);
        // the fourth line is still waiting in the RX queue
        assert_eq!(system.service(), Service::Stalled);
        assert!(!tx.is_empty());

        let mut ticks = 0;
        loop {
            let state = system.service();
            rasterizer.tick();
            ticks += 1;
            assert!(ticks < 100_000);

            if state == Service::Idle && rasterizer.is_idle() {
                break;
            }
        }

        assert_eq!(rasterizer.position(), [40, 10]);
        assert_eq!(system.planner().position(), Position::from_num(4.0, 1.0));
    }

    #[test]
    fn stall_leaves_serial_input_queued() {
        let mut rx: RingQueue<u8, 16> = RingQueue::new();
        let mut segments: SegmentQueue<2> = SegmentQueue::new();
        let (mut tx, rx) = rx.split();
        let (planner, mut rasterizer) = motion::split(
            &mut segments,
            config(),
            MockAxis::default(),
            MockAxis::default(),
            MockLaser::default(),
        );
        let mut system = LaserSystem::new(rx, planner);

        send(&mut tx, "G1 X1 F6000\n");
        assert_eq!(system.service(), Service::Busy);
        send(&mut tx, "G1 X2\n");
        assert_eq!(system.service(), Service::Stalled);

        while tx.try_push(b' ').is_ok() {}
        assert_eq!(system.service(), Service::Stalled);
        assert_eq!(tx.try_push(b' '), Err(b' '));

        while system.service() == Service::Stalled {
            rasterizer.tick();
        }
        while system.service() != Service::Idle {}

        assert!(tx.try_push(b'\n').is_ok());
        assert_eq!(system.planner().position(), Position::from_num(2.0, 0.0));
    }

    #[test]
    fn partial_line_waits_for_newline() {
        let mut rx: RingQueue<u8, 64> = RingQueue::new();
        let mut segments: SegmentQueue<4> = SegmentQueue::new();
        let (mut tx, rx) = rx.split();
        let (producer, mut consumer) = segments.split();
        let mut system = LaserSystem::new(rx, Planner::new(producer, config(), [0, 0]));

        send(&mut tx, "G1 X1");
        assert_eq!(system.service(), Service::Idle);
        assert_eq!(consumer.try_pop(), None);

        send(&mut tx, "0 F600\n");
        assert_eq!(system.service(), Service::Busy);
        assert_eq!(line_target(consumer.try_pop().unwrap()), [100, 0]);
    }
}
