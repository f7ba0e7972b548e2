mod common;

use axidma::bus::{ReadBeat, Resp};
use axidma::dma::reader::{self, ReadCore, ReadInputs};
use axidma::dma::regs::{REG_ERROR, REG_FIFO, REG_REMAINING};
use axidma::dma::{ReadState, StreamBeat, WriteState};
use axidma::memory::{ErrorRegion, MemoryParams};
use axidma::system::{reg_address, BusEvent, EngineKind, PortParams, SystemParams};
use axidma::bus::BusGeometry;
use common::*;

#[test]
fn read_across_4k_boundary() {
  let mut sys = system(1);
  sys.memory_mut().load_words(0x0FF8 / 8, &[1, 2, 3, 4]).unwrap();
  start(&mut sys, 0, true, 0x0FF8, 4, 16);

  assert!(sys.run_until(200, |s| s.irq(reader_irq(0))));
  assert!(sys.run_until(20, |s| s.port(0).sink.received().len() == 4));

  let events = sys.take_events();
  assert_eq!(reads(&events), vec![(0, 0x0FF8, 1), (0, 0x1000, 3)]);
  let out = sys.take_output(0);
  assert_eq!(out, frame(&[1, 2, 3, 4]));
  assert_eq!(sys.port(0).reader.stats().bursts, 2);
}

#[test]
fn writer_waits_for_a_full_burst() {
  let mut sys = system(1);
  start(&mut sys, 0, false, 0x100, 8, 8);
  sys.push_stream(0, (0..7).map(|i| StreamBeat::new(10 + i, false)));

  sys.run_until(40, |_| false);
  assert!(writes(&sys.take_events()).is_empty());
  assert_eq!(sys.port(0).writer.state(), WriteState::WaitForCredit);
  assert_eq!(sys.reg_read(reg_address(0, false, REG_FIFO)), 7);

  sys.push_stream(0, [StreamBeat::new(17, true)]);
  assert!(sys.run_until(100, |s| s.irq(writer_irq(0))));
  assert_eq!(writes(&sys.take_events()), vec![(0, 0x100, 8)]);
  assert_eq!(&sys.memory().words()[0x20..0x28], &[10, 11, 12, 13, 14, 15, 16, 17]);
  assert_eq!(sys.reg_read(reg_address(0, false, REG_REMAINING)), 0);
}

#[test]
fn zero_length_pulses_done_without_bus_traffic() {
  let mut sys = system(1);
  start(&mut sys, 0, true, 0x40, 0, 4);
  start(&mut sys, 0, false, 0x80, 0, 4);
  assert!(sys.run_until(10, |s| s.irq(reader_irq(0)) && s.irq(writer_irq(0))));
  sys.run_until(10, |_| false);

  let events = sys.take_events();
  let dones: Vec<_> = events
    .iter()
    .filter_map(|e| match e.event {
      BusEvent::Done { engine } => Some(engine),
      BusEvent::Ar { .. } | BusEvent::Aw { .. } | BusEvent::R { .. } | BusEvent::W { .. } | BusEvent::B { .. } => {
        panic!("unexpected bus traffic {:?}", e)
      },
    })
    .collect();
  assert_eq!(dones.iter().filter(|e| **e == EngineKind::Reader).count(), 1);
  assert_eq!(dones.iter().filter(|e| **e == EngineKind::Writer).count(), 1);
  assert!(sys.is_quiescent());
}

#[test]
fn error_response_is_latched_and_transfer_completes() {
  let mut sys = system_with(SystemParams {
    memory: MemoryParams {
      error_regions: vec![ErrorRegion {
        start: 0x200,
        end: 0x208,
        resp: Resp::SlvErr,
      }],
      ..MemoryParams::default()
    },
    ..params(1)
  });
  start(&mut sys, 0, true, 0x1F8, 3, 16);
  assert!(sys.run_until(200, |s| s.irq(reader_irq(0))));
  let error_reg = reg_address(0, true, REG_ERROR);
  assert_eq!(sys.reg_read(error_reg), Resp::SlvErr.code() as u32);

  assert!(sys.run_until(10, |s| s.port(0).sink.received().len() == 3));
  assert_eq!(sys.take_output(0).len(), 3);

  sys.reg_write(error_reg, 0);
  sys.tick();
  assert_eq!(sys.reg_read(error_reg), 0);
}

#[test]
fn new_error_wins_over_clear_in_same_cycle() {
  let g = BusGeometry::default();
  let core = ReadCore::default();
  let inp = ReadInputs {
    r_beat: Some(ReadBeat {
      id: 0,
      data: 0,
      resp: Resp::DecErr,
      last: true,
    }),
    clear_error: true,
    ..ReadInputs::default()
  };
  let (next, _) = reader::transition(&core, &inp, &g);
  assert_eq!(next.error, Resp::DecErr);
}

#[test]
fn frame_mode_writes_exactly_the_frame() {
  let mut sys = system_with(SystemParams {
    ports: vec![PortParams {
      frame_mode: true,
      ..PortParams::default()
    }],
    ..SystemParams::default()
  });
  let first: Vec<u64> = (1..=10).collect();
  let second: Vec<u64> = (100..105).collect();
  sys.push_stream(0, frame(&first));
  sys.push_stream(0, frame(&second));

  start(&mut sys, 0, false, 0x0, 0, 4);
  sys.tick();
  start(&mut sys, 0, false, 0x800, 0, 4);

  assert!(sys.run_until(300, |s| s.irq(writer_irq(0)) && s.port(0).writer.state() == WriteState::Idle
    && s.port(0).write_regs.pending().is_none()
    && s.port(0).source.is_drained()
    && s.port(0).write_fifo.is_empty()));
  assert!(sys.run_until(50, |s| s.is_quiescent()));

  let aws = writes(&sys.take_events());
  let first_frame: Vec<_> = aws.iter().filter(|(_, a, _)| *a < 0x800).collect();
  assert_eq!(first_frame.iter().map(|(_, _, n)| n).sum::<u32>(), 10);
  assert!(first_frame.iter().all(|(_, _, n)| *n <= 4));
  assert_eq!(aws.iter().map(|(_, _, n)| n).sum::<u32>(), 15);

  let words = sys.memory().words();
  assert_eq!(&words[0..10], first.as_slice());
  assert_eq!(words[10], 0);
  assert_eq!(&words[0x100..0x105], second.as_slice());
  assert_eq!(sys.reg_read(reg_address(0, false, REG_REMAINING)), 5);
  assert_eq!(sys.port(0).write_regs.dropped(), 0);
}

#[test]
fn reset_mid_transfer_returns_to_idle() {
  let mut sys = system(1);
  start(&mut sys, 0, true, 0x0, 64, 8);
  sys.run_until(12, |_| false);
  assert!(sys.read_arbiter().outstanding() > 0);

  sys.reset();
  assert_eq!(sys.port(0).reader.state(), ReadState::Idle);
  assert_eq!(sys.read_arbiter().outstanding(), 0);
  assert_eq!(sys.port(0).reader.pending_words(), 0);
  assert!(!sys.irq(reader_irq(0)));

  sys.run_until(30, |_| false);
  assert!(sys.take_events().is_empty());
  assert!(sys.is_quiescent());

  // Still usable afterwards
  start(&mut sys, 0, true, 0x0, 4, 4);
  assert!(sys.run_until(100, |s| s.irq(reader_irq(0))));
}

#[test]
fn unaligned_start_is_rounded_to_its_word() {
  let mut sys = system(1);
  sys.memory_mut().load_words(0x0FF8 / 8, &[1, 2, 3, 4]).unwrap();
  start(&mut sys, 0, true, 0x0FFC, 4, 16);

  assert!(sys.run_until(200, |s| s.irq(reader_irq(0))));
  assert!(sys.run_until(20, |s| s.is_quiescent()));
  assert_eq!(reads(&sys.take_events()), vec![(0, 0x0FF8, 1), (0, 0x1000, 3)]);
  assert_eq!(sys.take_output(0), frame(&[1, 2, 3, 4]));
}

#[test]
fn buffered_stream_words_keep_the_port_busy() {
  let mut sys = system(1);
  sys.push_stream(0, frame(&[1, 2, 3]));
  sys.run_until(10, |_| false);
  assert!(sys.port(0).source.is_drained());
  assert_eq!(sys.port(0).write_fifo.level(), 3);
  assert!(!sys.is_quiescent());
}
