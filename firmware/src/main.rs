#![no_std]
#![no_main]

mod receiver;

use assign_resources::assign_resources;
use cnclaser::config::MachineConfig;
use cnclaser::hardware::{CalibrationError, LaserDrive, PositionalMotor, StepperDrive};
use cnclaser::motion::{self, Rasterizer, SegmentQueue};
use cnclaser::ring_queue::RingQueue;
use cnclaser::systems::{LaserSystem, Service};
use cnclaser::{READY_MESSAGE, RX_QUEUE_CAPACITY, SEGMENT_QUEUE_DEPTH, WELCOME_BANNER};
use embassy_executor::{Executor, InterruptExecutor, Spawner};
use embassy_futures::yield_now;
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::{
    bind_interrupts,
    gpio::{Input, Level, Output, Pull},
    peripherals,
    peripherals::USB as pUSB,
};
use embassy_time::{Delay, Duration, Ticker, Timer};
use panic_probe as _;
use static_cell::StaticCell;

static EXECUTOR_LOW: StaticCell<Executor> = StaticCell::new();
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

static RX_QUEUE: StaticCell<RingQueue<u8, RX_QUEUE_CAPACITY>> = StaticCell::new();
static SEGMENT_QUEUE: StaticCell<SegmentQueue<SEGMENT_QUEUE_DEPTH>> = StaticCell::new();

const IDLE_POLL: Duration = Duration::from_millis(1);

type Axis = StepperDrive<Output<'static>, Output<'static>, Input<'static>, Delay>;
type LaserGate = LaserDrive<Output<'static>>;
type MachineRasterizer = Rasterizer<'static, Axis, Axis, LaserGate, SEGMENT_QUEUE_DEPTH>;
type MachineSystem = LaserSystem<'static, RX_QUEUE_CAPACITY, SEGMENT_QUEUE_DEPTH>;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<pUSB>;
});

assign_resources! {
    usb: UsbResources {
        usb: USB,
    }

    x_axis: XAxisResources {
        step: PIN_2,
        dir: PIN_3,
        home: PIN_4,
    }

    y_axis: YAxisResources {
        step: PIN_5,
        dir: PIN_6,
        home: PIN_7,
    }

    laser: LaserResources {
        gate: PIN_15,
        led: PIN_25,
    }
}

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    let executor = EXECUTOR_LOW.init(Executor::new());
    executor.run(move |spawner| spawner.spawn(startup(r, spawner)).unwrap());
}

#[embassy_executor::task]
async fn startup(r: AssignedResources, spawner: Spawner) {
    let usb_driver = embassy_rp::usb::Driver::new(r.usb.usb, Irqs);
    spawner.spawn(receiver::usb_comm_task(usb_driver)).unwrap();

    let config = MachineConfig::default();

    let laser = LaserDrive::new(Output::new(r.laser.gate, Level::Low));
    let mut x = StepperDrive::new(
        Output::new(r.x_axis.step, Level::Low),
        Output::new(r.x_axis.dir, Level::Low),
        Input::new(r.x_axis.home, Pull::Down),
        Delay,
        false,
        &config,
    );
    let mut y = StepperDrive::new(
        Output::new(r.y_axis.step, Level::Low),
        Output::new(r.y_axis.dir, Level::Low),
        Input::new(r.y_axis.home, Pull::Down),
        Delay,
        false,
        &config,
    );

    let homed = calibrate("X", &mut x).and_then(|()| calibrate("Y", &mut y));
    if homed.is_err() {
        log::error!("Motion disabled, reset the machine");
        core::future::pending::<()>().await;
    }

    let rx = RX_QUEUE.init(RingQueue::new());
    let (rx_producer, rx_consumer) = rx.split();
    receiver::attach(rx_producer);

    let segments = SEGMENT_QUEUE.init(SegmentQueue::new());
    let (planner, rasterizer) = motion::split(segments, config, x, y, laser);

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let tick_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    let period = Duration::from_micros(config.tick_period_us as u64);
    tick_spawner.spawn(tick(rasterizer, period)).unwrap();

    log::info!("{}", WELCOME_BANNER);
    log::info!("{}", READY_MESSAGE);

    spawner
        .spawn(main_loop(LaserSystem::new(rx_consumer, planner)))
        .unwrap();
    spawner
        .spawn(heartbeat(Output::new(r.laser.led, Level::Low)))
        .unwrap();
}

fn calibrate(name: &str, axis: &mut impl PositionalMotor) -> Result<(), CalibrationError> {
    axis.calibrate()
        .inspect_err(|err| log::error!("{} axis calibration failed: {}", name, err))?;
    log::info!("{} axis homed", name);
    Ok(())
}

#[embassy_executor::task]
async fn tick(mut rasterizer: MachineRasterizer, period: Duration) {
    let mut ticker = Ticker::every(period);
    loop {
        rasterizer.tick();

        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn main_loop(mut system: MachineSystem) {
    loop {
        match system.service() {
            Service::Busy => yield_now().await,
            Service::Idle | Service::Stalled => Timer::after(IDLE_POLL).await,
        }

        let dropped = receiver::take_dropped();
        if dropped > 0 {
            log::warn!("Dropped {} bytes received before startup", dropped);
        }
    }
}

#[embassy_executor::task]
async fn heartbeat(mut led: Output<'static>) {
    let mut ticker = Ticker::every(Duration::from_millis(500));
    loop {
        led.toggle();

        ticker.next().await;
    }
}
