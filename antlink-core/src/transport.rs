//! Transport context
//!
//! All link state lives in one [`Transport`] so it can sit in a `static`
//! shared by the main flow and the two timer interrupt handlers:
//!
//! | Field       | Mutated by                            |
//! |-------------|---------------------------------------|
//! | `engine`    | interrupt handlers; main flow arms TX |
//! | `assembler` | main flow only                        |
//! | `mailbox`   | RX interrupt deposits, main takes     |
//!
//! Every access goes through a critical-section mutex, so a handler never
//! observes half-updated state. Building a frame happens inside one
//! critical section; draining it does not, since each byte takes ten bit
//! periods on the line.
//!
//! ```ignore
//! static LINK: Transport<Timer0> = Transport::new(Timer0::new(), BitTiming::DEFAULT);
//!
//! #[interrupt]
//! fn TIMER0_CC0() { LINK.on_tx_interrupt() }
//!
//! #[interrupt]
//! fn TIMER0_CC1() { LINK.on_rx_interrupt() }
//!
//! LINK.init();
//! LINK.send_frame(&[0x4A, 0x00])?;
//! let reply = LINK.receive().await;
//! ```

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use antlink_hal::{CaptureCompareTimer, UartRx, UartTx};
use antlink_protocol::{FrameError, HostMessage, FRAME_CAPACITY};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::assembler::FrameAssembler;
use crate::config::BitTiming;
use crate::engine::{BitEngine, TxBusy};
use crate::mailbox::Mailbox;

/// Link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Frames fully shifted out
    pub frames_sent: u32,
    /// Bytes armed on the transmitter
    pub bytes_sent: u32,
    /// Bytes completed by the receiver
    pub bytes_received: u32,
    /// Received bytes lost to mailbox overwrites
    pub rx_overruns: u32,
}

impl LinkStats {
    pub const fn new() -> Self {
        Self {
            frames_sent: 0,
            bytes_sent: 0,
            bytes_received: 0,
            rx_overruns: 0,
        }
    }
}

/// Software UART link with ANT framing
pub struct Transport<T> {
    engine: Mutex<CriticalSectionRawMutex, RefCell<BitEngine<T>>>,
    assembler: Mutex<CriticalSectionRawMutex, RefCell<FrameAssembler>>,
    mailbox: Mutex<CriticalSectionRawMutex, Cell<Mailbox>>,
    rx_ready: Signal<CriticalSectionRawMutex, ()>,
    stats: Mutex<CriticalSectionRawMutex, Cell<LinkStats>>,
}

impl<T: CaptureCompareTimer> Transport<T> {
    pub const fn new(timer: T, timing: BitTiming) -> Self {
        Self {
            engine: Mutex::new(RefCell::new(BitEngine::new(timer, timing))),
            assembler: Mutex::new(RefCell::new(FrameAssembler::new())),
            mailbox: Mutex::new(Cell::new(Mailbox::new())),
            rx_ready: Signal::new(),
            stats: Mutex::new(Cell::new(LinkStats::new())),
        }
    }

    /// Idle the line, arm start-edge capture and start the timer
    pub fn init(&self) {
        self.engine.lock(|engine| engine.borrow_mut().init());
        let timing = self.timing();
        link_debug!(
            "soft uart up: bit {} ticks, half {} ticks",
            timing.bit_period,
            timing.half_bit
        );
    }

    /// TX compare interrupt entry point
    pub fn on_tx_interrupt(&self) {
        self.engine.lock(|engine| engine.borrow_mut().on_tx_compare());
    }

    /// RX capture/compare interrupt entry point
    ///
    /// Completed bytes go to the mailbox and wake [`receive`](Self::receive).
    pub fn on_rx_interrupt(&self) {
        let received = self.engine.lock(|engine| engine.borrow_mut().on_rx_event());
        if let Some(byte) = received {
            self.deliver(byte);
        }
    }

    fn deliver(&self, byte: u8) {
        let overwrote = self.mailbox.lock(|cell| {
            let mut mailbox = cell.get();
            let overwrote = mailbox.deposit(byte);
            cell.set(mailbox);
            overwrote
        });

        self.update_stats(|stats| {
            stats.bytes_received = stats.bytes_received.wrapping_add(1);
            if overwrote {
                stats.rx_overruns = stats.rx_overruns.wrapping_add(1);
            }
        });

        if overwrote {
            link_warn!("rx mailbox overrun, unread byte replaced by {=u8:#x}", byte);
        }
        self.rx_ready.signal(());
    }

    fn update_stats(&self, f: impl FnOnce(&mut LinkStats)) {
        self.stats.lock(|cell| {
            let mut stats = cell.get();
            f(&mut stats);
            cell.set(stats);
        });
    }

    /// Arm the transmitter if it is idle
    pub fn try_send_byte(&self, byte: u8) -> Result<(), TxBusy> {
        self.engine
            .lock(|engine| engine.borrow_mut().try_transmit(byte))?;
        self.update_stats(|stats| stats.bytes_sent = stats.bytes_sent.wrapping_add(1));
        link_trace!("tx {=u8:#x}", byte);
        Ok(())
    }

    /// Transmit one byte, spinning while the previous byte is in flight
    ///
    /// Returns once the byte is armed; its bits leave on later interrupts.
    pub fn send_byte(&self, byte: u8) {
        self.send_byte_with(byte, &mut core::hint::spin_loop);
    }

    /// [`send_byte`](Self::send_byte) calling `relax` on every wait iteration
    ///
    /// `relax` is where a target enters a low-power wait for the next
    /// interrupt, or where a test harness injects timer events.
    pub fn send_byte_with(&self, byte: u8, relax: &mut impl FnMut()) {
        while self.try_send_byte(byte).is_err() {
            relax();
        }
    }

    /// Frame `payload` and transmit it, blocking until the checksum byte has
    /// left the line
    pub fn send_frame(&self, payload: &[u8]) -> Result<(), FrameError> {
        self.send_frame_with(payload, &mut core::hint::spin_loop)
    }

    /// [`send_frame`](Self::send_frame) with an explicit wait hook
    pub fn send_frame_with(
        &self,
        payload: &[u8],
        relax: &mut impl FnMut(),
    ) -> Result<(), FrameError> {
        let len = self
            .assembler
            .lock(|assembler| assembler.borrow_mut().build(payload))
            .map_err(|e| {
                link_warn!("frame rejected: {}", e);
                e
            })?;

        link_debug!(
            "tx frame: {} bytes, msg {=u8:#x}",
            len,
            payload.first().copied().unwrap_or_default()
        );

        while let Some(byte) = self
            .assembler
            .lock(|assembler| assembler.borrow_mut().next_byte())
        {
            self.send_byte_with(byte, relax);
        }
        self.flush_with(relax);

        self.update_stats(|stats| stats.frames_sent = stats.frames_sent.wrapping_add(1));
        Ok(())
    }

    /// Encode `message` and transmit it like [`send_frame`](Self::send_frame)
    pub fn send_message(&self, message: &HostMessage) -> Result<(), FrameError> {
        self.send_message_with(message, &mut core::hint::spin_loop)
    }

    /// [`send_message`](Self::send_message) with an explicit wait hook
    pub fn send_message_with(
        &self,
        message: &HostMessage,
        relax: &mut impl FnMut(),
    ) -> Result<(), FrameError> {
        let frame = message.to_frame()?;
        self.send_frame_with(&frame.payload, relax)
    }

    /// Whether a byte is still being shifted out
    pub fn tx_busy(&self) -> bool {
        self.engine.lock(|engine| engine.borrow().tx_busy())
    }

    /// Spin until the transmitter is idle
    pub fn flush(&self) {
        self.flush_with(&mut core::hint::spin_loop);
    }

    /// [`flush`](Self::flush) with an explicit wait hook
    pub fn flush_with(&self, relax: &mut impl FnMut()) {
        while self.tx_busy() {
            relax();
        }
    }

    /// Take the last received byte, if a new one arrived since the last take
    pub fn received_byte(&self) -> Option<u8> {
        self.mailbox.lock(|cell| {
            let mut mailbox = cell.get();
            let byte = mailbox.take();
            cell.set(mailbox);
            byte
        })
    }

    /// Wait for the next received byte
    pub async fn receive(&self) -> u8 {
        loop {
            if let Some(byte) = self.received_byte() {
                return byte;
            }
            self.rx_ready.wait().await;
        }
    }

    /// Copy of the frame most recently built for transmission
    pub fn frame_snapshot(&self) -> heapless::Vec<u8, FRAME_CAPACITY> {
        self.assembler.lock(|assembler| {
            heapless::Vec::from_slice(assembler.borrow().frame()).unwrap_or_default()
        })
    }

    pub fn stats(&self) -> LinkStats {
        self.stats.lock(Cell::get)
    }

    pub fn timing(&self) -> BitTiming {
        self.engine.lock(|engine| engine.borrow().timing())
    }

    /// Run `f` on the timer inside a critical section
    pub fn with_timer<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        self.engine
            .lock(|engine| f(engine.borrow_mut().timer_mut()))
    }
}

impl<T: CaptureCompareTimer> UartTx for &Transport<T> {
    type Error = Infallible;

    fn write_byte(&mut self, byte: u8) -> Result<(), Infallible> {
        self.send_byte(byte);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Transport::flush(self);
        Ok(())
    }
}

impl<T: CaptureCompareTimer> UartRx for &Transport<T> {
    type Error = Infallible;

    fn try_read_byte(&mut self) -> Result<Option<u8>, Infallible> {
        Ok(self.received_byte())
    }
}

impl<T> embedded_io_async::ErrorType for &Transport<T> {
    type Error = Infallible;
}

impl<T: CaptureCompareTimer> embedded_io_async::Read for &Transport<T> {
    /// Reads at most one byte: the mailbox holds one
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        match buf.first_mut() {
            Some(slot) => {
                *slot = self.receive().await;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{self, SimTimer};
    use antlink_hal::Level;
    use antlink_protocol::{ChannelConfig, FrameParser, MAX_PAYLOAD_SIZE};
    use embassy_futures::block_on;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::vec::Vec;

    const BIT: usize = BitTiming::DEFAULT.bit_period as usize;

    fn loopback() -> Transport<SimTimer> {
        let transport = Transport::new(SimTimer::with_loopback(), BitTiming::DEFAULT);
        transport.init();
        transport
    }

    fn open_line() -> Transport<SimTimer> {
        let transport = Transport::new(SimTimer::new(), BitTiming::DEFAULT);
        transport.init();
        transport
    }

    /// Send a frame over loopback, collecting everything that comes back
    fn send_and_collect(transport: &Transport<SimTimer>, payload: &[u8]) -> Vec<u8> {
        let mut echoed = Vec::new();
        let result = transport.send_frame_with(payload, &mut || {
            sim::step(transport);
            if let Some(byte) = transport.received_byte() {
                echoed.push(byte);
            }
        });
        assert_eq!(result, Ok(()));
        echoed
    }

    fn record_tx_pin(transport: &Transport<SimTimer>, ticks: usize) -> Vec<Level> {
        (0..ticks)
            .map(|_| {
                sim::step(transport);
                transport.with_timer(|timer| timer.tx_pin())
            })
            .collect()
    }

    #[test]
    fn test_reset_command_on_the_wire() {
        let transport = loopback();
        let echoed = send_and_collect(&transport, &[0x4A, 0x00]);

        assert_eq!(echoed, [0xA4, 0x01, 0x4A, 0x00, 0xEF]);
        assert_eq!(transport.stats().frames_sent, 1);
        assert_eq!(transport.stats().bytes_sent, 5);
        assert!(!transport.tx_busy());
    }

    #[test]
    fn test_alternating_byte_waveform() {
        let transport = open_line();
        transport.send_byte_with(0x55, &mut || {
            sim::step(&transport);
        });

        let line = record_tx_pin(&transport, 13 * BIT);
        let start = line
            .iter()
            .position(|level| level.is_low())
            .expect("start bit never appeared");
        assert!(line[..start].iter().all(|level| level.is_high()));

        let bits: Vec<Level> = (0..10).map(|k| line[start + BIT / 2 + k * BIT]).collect();

        use Level::{High as H, Low as L};
        assert_eq!(bits, [L, H, L, H, L, H, L, H, L, H]);

        // Back at mark after the stop bit
        assert!(line[start + 10 * BIT..].iter().all(|level| level.is_high()));
        assert!(!transport.tx_busy());
    }

    #[test]
    fn test_every_byte_value_survives_loopback() {
        let transport = loopback();
        for byte in 0..=u8::MAX {
            transport.send_byte_with(byte, &mut || {
                sim::step(&transport);
            });
            transport.flush_with(&mut || {
                sim::step(&transport);
            });
            assert_eq!(transport.received_byte(), Some(byte), "byte {byte:#04x}");
        }
        assert_eq!(transport.stats().rx_overruns, 0);
    }

    #[test]
    fn test_second_byte_waits_for_first() {
        let transport = loopback();
        transport.send_byte_with(0x0F, &mut || {
            sim::step(&transport);
        });
        assert_eq!(transport.try_send_byte(0xF0), Err(TxBusy));

        let mut echoed = Vec::new();
        let mut waits = 0usize;
        transport.send_byte_with(0xF0, &mut || {
            waits += 1;
            sim::step(&transport);
            if let Some(byte) = transport.received_byte() {
                echoed.push(byte);
            }
        });

        // The caller was held for the whole first byte
        assert!(waits >= 10 * BIT, "released after {waits} ticks");
        assert_eq!(echoed, [0x0F]);

        transport.flush_with(&mut || {
            sim::step(&transport);
            if let Some(byte) = transport.received_byte() {
                echoed.push(byte);
            }
        });
        assert_eq!(echoed, [0x0F, 0xF0]);
    }

    #[test]
    fn test_frame_line_time() {
        let transport = open_line();
        let mut ticks = 0usize;
        transport
            .send_frame_with(&[0x4A, 0x00], &mut || {
                ticks += 1;
                sim::step(&transport);
            })
            .unwrap();

        let line_ticks = transport.timing().line_ticks(5) as usize;
        assert!(ticks >= line_ticks);
        assert!(ticks <= line_ticks + 5 * BIT + 5);
    }

    #[test]
    fn test_rejected_payloads_send_nothing() {
        let transport = open_line();
        let mut relax = || {
            panic!("nothing should be transmitted");
        };

        assert_eq!(
            transport.send_frame_with(&[], &mut relax),
            Err(FrameError::EmptyPayload)
        );
        assert_eq!(
            transport.send_frame_with(&[0u8; MAX_PAYLOAD_SIZE + 1], &mut relax),
            Err(FrameError::PayloadTooLarge)
        );
        assert!(!transport.tx_busy());
        assert_eq!(transport.stats(), LinkStats::default());
    }

    #[test]
    fn test_channel_setup_over_loopback() {
        let transport = loopback();
        let mut parser = FrameParser::new();

        for message in ChannelConfig::default().setup_messages() {
            let mut frame = None;
            transport
                .send_message_with(&message, &mut || {
                    sim::step(&transport);
                    if let Some(byte) = transport.received_byte() {
                        if let Some(parsed) = parser.feed(byte).unwrap() {
                            frame = Some(parsed);
                        }
                    }
                })
                .unwrap();

            let frame = frame.expect("frame never echoed");
            assert_eq!(frame, message.to_frame().unwrap());
        }
        assert_eq!(transport.stats().frames_sent, 7);
    }

    #[test]
    fn test_identical_payloads_identical_wire_bytes() {
        let transport = loopback();
        let payload = [0x51, 0x00, 0x31, 0x00, 0x0B, 0x05];

        let first = send_and_collect(&transport, &payload);
        let second = send_and_collect(&transport, &payload);

        assert_eq!(first.len(), payload.len() + 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_receive_from_radio() {
        let transport = open_line();
        sim::drive_byte(&transport, 0x40);

        assert_eq!(transport.received_byte(), Some(0x40));
        assert_eq!(transport.received_byte(), None);
        assert_eq!(transport.stats().bytes_received, 1);
    }

    #[test]
    fn test_unconsumed_byte_is_overwritten() {
        let transport = open_line();
        sim::drive_byte(&transport, 0x11);
        sim::drive_byte(&transport, 0x22);

        assert_eq!(transport.received_byte(), Some(0x22));
        assert_eq!(transport.received_byte(), None);
        assert_eq!(transport.stats().rx_overruns, 1);
        assert_eq!(transport.stats().bytes_received, 2);
    }

    #[test]
    fn test_glitch_is_taken_as_start_bit() {
        let transport = open_line();
        transport.with_timer(|timer| timer.drive_rx(Level::Low));
        sim::run(&transport, 2);
        transport.with_timer(|timer| timer.drive_rx(Level::High));
        sim::run(&transport, 10 * BIT as u32);

        // Every sample saw mark
        assert_eq!(transport.received_byte(), Some(0xFF));
    }

    #[test]
    fn test_receive_during_frame_transmission() {
        let transport = open_line();
        let expected: [u8; 7] = [0xA4, 0x03, 0x42, 0x00, 0x10, 0x00, 0xA4 ^ 0x03 ^ 0x42 ^ 0x10];
        let reply: [u8; 4] = [0xA4, 0x00, 0x6F, 0xA4 ^ 0x6F];

        // Clock a reply in from the radio while our frame goes out; the RX
        // line is stepped one tick per wait iteration.
        let mut rx_bits = reply.iter().flat_map(|&byte| {
            let framed = crate::engine::frame_byte(byte);
            (0..10).map(move |k| Level::from_bit((framed >> k) & 1 != 0))
        });
        let mut tick = 0usize;
        let mut received = Vec::new();
        let mut parser = FrameParser::new();

        transport
            .send_frame_with(&[0x42, 0x00, 0x10, 0x00], &mut || {
                if tick % BIT == 0 {
                    let level = rx_bits.next().unwrap_or(Level::High);
                    transport.with_timer(|timer| timer.drive_rx(level));
                }
                tick += 1;
                sim::step(&transport);

                assert_eq!(&transport.frame_snapshot()[..], &expected[..]);
                if let Some(byte) = transport.received_byte() {
                    received.push(byte);
                }
            })
            .unwrap();

        assert_eq!(received, reply);
        let frame = parser.feed_bytes(&received).unwrap().unwrap();
        assert_eq!(frame.msg_id(), 0x6F);
        assert_eq!(transport.stats().rx_overruns, 0);
    }

    #[test]
    fn test_frames_stay_whole_under_concurrent_interrupts() {
        let transport = loopback();
        let payloads: [&[u8]; 2] = [&[0x4A, 0x00], &[0x46, 0x00, 1, 2, 3, 4, 5, 6, 7, 8]];
        let mut expected = [[0u8; FRAME_CAPACITY]; 2];
        let mut lens = [0usize; 2];
        for (i, payload) in payloads.iter().enumerate() {
            lens[i] = antlink_protocol::encode(payload, &mut expected[i]).unwrap();
        }
        let done = AtomicBool::new(false);

        let echoed = std::thread::scope(|s| {
            let pump = s.spawn(|| {
                let mut echoed = Vec::new();
                while !done.load(Ordering::Acquire) {
                    sim::step(&transport);
                    if let Some(byte) = transport.received_byte() {
                        echoed.push(byte);
                    }

                    let snapshot = transport.frame_snapshot();
                    if !snapshot.is_empty() {
                        assert!(
                            (0..2).any(|i| snapshot[..] == expected[i][..lens[i]]),
                            "torn frame {snapshot:?}"
                        );
                    }
                }
                echoed
            });

            for round in 0..4 {
                transport.send_frame(payloads[round % 2]).unwrap();
            }
            done.store(true, Ordering::Release);
            pump.join().unwrap()
        });

        let mut parser = FrameParser::new();
        let mut ids = Vec::new();
        for byte in echoed {
            if let Some(frame) = parser.feed(byte).unwrap() {
                ids.push(frame.msg_id());
            }
        }
        assert_eq!(ids, [0x4A, 0x46, 0x4A, 0x46]);
        assert_eq!(transport.stats().frames_sent, 4);
    }

    #[test]
    fn test_uart_traits_over_loopback() {
        let transport = loopback();
        let done = AtomicBool::new(false);

        let echoed = std::thread::scope(|s| {
            let pump = s.spawn(|| {
                let mut echoed = Vec::new();
                while !done.load(Ordering::Acquire) {
                    sim::step(&transport);
                    if let Some(byte) = transport.received_byte() {
                        echoed.push(byte);
                    }
                }
                echoed
            });

            let mut tx = &transport;
            tx.write_blocking(b"ANT").unwrap();
            UartTx::flush(&mut tx).unwrap();
            done.store(true, Ordering::Release);
            pump.join().unwrap()
        });

        assert_eq!(echoed, b"ANT");
    }

    #[test]
    fn test_async_receive() {
        let transport = open_line();
        sim::drive_byte(&transport, 0x4B);
        assert_eq!(block_on(transport.receive()), 0x4B);

        // Woken by a byte that arrives after the wait started
        let byte = std::thread::scope(|s| {
            let waiter = s.spawn(|| block_on(transport.receive()));
            sim::drive_byte(&transport, 0x6F);
            waiter.join().unwrap()
        });
        assert_eq!(byte, 0x6F);
    }

    #[test]
    fn test_embedded_io_read() {
        use embedded_io_async::Read;

        let transport = open_line();
        sim::drive_byte(&transport, 0x80);

        let mut reader = &transport;
        let mut buf = [0u8; 4];
        assert_eq!(block_on(reader.read(&mut buf)), Ok(1));
        assert_eq!(buf[0], 0x80);
        assert_eq!(block_on(reader.read(&mut [])), Ok(0));
    }

    #[test]
    fn test_uart_rx_try_read() {
        let transport = open_line();
        let mut rx = &transport;
        assert_eq!(rx.try_read_byte(), Ok(None));

        sim::drive_byte(&transport, 0x01);
        assert_eq!(rx.read_byte(), Ok(0x01));
    }
}
