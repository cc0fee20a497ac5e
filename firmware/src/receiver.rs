use core::cell::RefCell;

use cnclaser::RX_QUEUE_CAPACITY;
use cnclaser::ring_queue::Producer;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Timer};
use embassy_usb_logger::ReceiverHandler;
use portable_atomic::{AtomicU32, Ordering};

pub type RxProducer = Producer<'static, u8, RX_QUEUE_CAPACITY>;

static RX_PRODUCER: Mutex<CriticalSectionRawMutex, RefCell<Option<RxProducer>>> =
    Mutex::new(RefCell::new(None));

static RX_DROPPED: AtomicU32 = AtomicU32::new(0);

const RX_RETRY: Duration = Duration::from_micros(500);

/// Hands the RX queue's producer to the USB receive path. Bytes arriving
/// before this are dropped.
pub fn attach(producer: RxProducer) {
    RX_PRODUCER.lock(|cell| *cell.borrow_mut() = Some(producer));
}

/// Bytes received before the RX queue was attached, since the last call.
pub fn take_dropped() -> u32 {
    RX_DROPPED.swap(0, Ordering::Relaxed)
}

struct Handler;

impl ReceiverHandler for Handler {
    /// Waits for room in the RX queue instead of dropping bytes. While this
    /// waits no further USB packet is read, so the host is held off by NAKs.
    async fn handle_data(&self, data: &[u8]) {
        for &byte in data {
            loop {
                let pushed = RX_PRODUCER.lock(|cell| match cell.borrow_mut().as_mut() {
                    Some(producer) => producer.try_push(byte).is_ok(),
                    None => {
                        RX_DROPPED.fetch_add(1, Ordering::Relaxed);
                        true
                    }
                });

                if pushed {
                    break;
                }
                Timer::after(RX_RETRY).await;
            }
        }
    }

    fn new() -> Self {
        Self
    }
}

#[embassy_executor::task]
pub async fn usb_comm_task(driver: embassy_rp::usb::Driver<'static, embassy_rp::peripherals::USB>) {
    embassy_usb_logger::run!(1024, log::LevelFilter::Info, driver, Handler);
}
