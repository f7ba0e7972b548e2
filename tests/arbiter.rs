mod common;

use axidma::memory::MemoryParams;
use axidma::system::{BusEvent, SystemParams};
use common::*;

#[test]
fn read_grants_alternate_between_busy_ports() {
  let mut sys = system(2);
  start(&mut sys, 0, true, 0x0000, 8, 1);
  start(&mut sys, 1, true, 0x2000, 8, 1);
  assert!(sys.run_until(500, |s| s.irq(reader_irq(0)) && s.irq(reader_irq(1))));

  let order: Vec<usize> = reads(&sys.take_events()).iter().map(|(p, _, _)| *p).collect();
  assert_eq!(order.len(), 16);
  assert!(order.windows(2).all(|w| w[0] != w[1]), "grant order {:?}", order);
  assert_eq!(sys.read_arbiter().grants(), &[8, 8]);
}

#[test]
fn read_data_reaches_its_owner() {
  let mut sys = system_with(SystemParams {
    input_register: true,
    output_register: true,
    ..params(2)
  });
  let a: Vec<u64> = (0..20).map(|i| 0x100 + i).collect();
  let b: Vec<u64> = (0..20).map(|i| 0x200 + i).collect();
  sys.memory_mut().load_words(0, &a).unwrap();
  sys.memory_mut().load_words(512, &b).unwrap();
  start(&mut sys, 0, true, 0, 20, 3);
  start(&mut sys, 1, true, 512 * 8, 20, 5);

  assert!(sys.run_until(1000, |s| s.irq(reader_irq(0)) && s.irq(reader_irq(1))));
  assert!(sys.run_until(10, |s| s.is_quiescent()));
  assert_eq!(sys.take_output(0), frame(&a));
  assert_eq!(sys.take_output(1), frame(&b));
  assert!(sys.read_arbiter().queue().is_empty());
}

#[test]
fn write_bursts_never_interleave() {
  let mut sys = system(2);
  for p in 0..2 {
    let data: Vec<u64> = (0..32).map(|i| (p as u64 + 1) * 1000 + i).collect();
    sys.push_stream(p, frame(&data));
    start(&mut sys, p, false, (p as u32) * 0x1000, 32, 4);
  }
  assert!(sys.run_until(2000, |s| s.irq(writer_irq(0)) && s.irq(writer_irq(1))));

  let mut owner: Option<usize> = None;
  let mut bursts = 0;
  for e in sys.take_events() {
    match e.event {
      BusEvent::Aw { .. } => {
        assert_eq!(owner, None, "AW from port {} while port {:?} owns the bus", e.port, owner);
        owner = Some(e.port);
        bursts += 1;
      },
      BusEvent::W { .. } => assert_eq!(owner, Some(e.port)),
      BusEvent::B { .. } => {
        assert_eq!(owner, Some(e.port));
        owner = None;
      },
      _ => {},
    }
  }
  assert_eq!(bursts, 16);

  let words = sys.memory().words();
  for p in 0..2usize {
    let base = p * 0x1000 / 8;
    let expect: Vec<u64> = (0..32).map(|i| (p as u64 + 1) * 1000 + i).collect();
    assert_eq!(&words[base..base + 32], expect.as_slice());
  }
}

#[test]
fn shallow_outstanding_limit_still_completes() {
  let mut sys = system_with(SystemParams {
    memory: MemoryParams {
      read_outstanding: 1,
      read_latency: 7,
      ..memory(4096)
    },
    ..params(2)
  });
  start(&mut sys, 0, true, 0, 33, 16);
  start(&mut sys, 1, true, 0x4000, 33, 16);
  assert!(sys.run_until(2000, |s| s.irq(reader_irq(0)) && s.irq(reader_irq(1))));
  assert!(sys.run_until(10, |s| s.is_quiescent()));
  assert_eq!(sys.take_output(0).len(), 33);
  assert_eq!(sys.take_output(1).len(), 33);
}

#[test]
fn registered_reads_reach_memory() {
  let mut sys = system_with(SystemParams {
    input_register: true,
    output_register: true,
    ..params(1)
  });
  let data: Vec<u64> = (0..20).map(|i| 0x40 + i).collect();
  sys.memory_mut().load_words(0, &data).unwrap();
  start(&mut sys, 0, true, 0, 20, 4);

  assert!(sys.run_until(2000, |s| s.irq(reader_irq(0))));
  assert!(sys.run_until(10, |s| s.is_quiescent()));
  assert_eq!(sys.memory().stats().read_bursts, 5);
  assert_eq!(sys.take_output(0), frame(&data));
}

fn invariants_hold(ports: usize, outstanding: usize, input_register: bool, output_register: bool) {
  let mut sys = system_with(SystemParams {
    input_register,
    output_register,
    memory: MemoryParams {
      read_outstanding: outstanding,
      ..memory(16384)
    },
    ..params(ports)
  });
  let depth = sys.read_arbiter().queue().depth();
  assert_eq!(depth, outstanding);

  let mut inputs = Vec::new();
  for p in 0..ports {
    let data: Vec<u64> = (0..20).map(|i| ((p as u64) << 32) | i).collect();
    sys.memory_mut().load_words(p * 512, &data).unwrap();
    start(&mut sys, p, true, (p * 4096) as u32, 20, 4);
    sys.push_stream(p, frame(&data));
    start(&mut sys, p, false, 0x10000 + (p * 4096) as u32, 20, 5);
    inputs.push(data);
  }

  let all_done = |s: &axidma::DmaSystem| (0..ports).all(|p| s.irq(reader_irq(p)) && s.irq(writer_irq(p)));
  let mut finished = false;
  for _ in 0..5000 {
    sys.tick();
    assert!(sys.read_arbiter().queue().len() <= depth);
    for port in sys.ports() {
      if port.reader.output.done {
        assert_eq!(port.reader.pending_words(), 0);
      }
      if port.writer.output.done {
        assert_eq!(port.writer.pending_words(), 0);
      }
    }
    if all_done(&sys) && sys.is_quiescent() {
      finished = true;
      break;
    }
  }
  let case = (ports, outstanding, input_register, output_register);
  assert!(finished, "stalled: {:?}", case);

  for (p, data) in inputs.iter().enumerate() {
    assert_eq!(&sys.take_output(p), &frame(data), "{:?}", case);
    let base = (0x10000 + p * 4096) / 8;
    assert_eq!(&sys.memory().words()[base..base + 20], data.as_slice(), "{:?}", case);
  }
}

#[test]
fn queue_bound_and_idle_done_under_every_register_option() {
  for ports in [1, 3] {
    for outstanding in [1, 3] {
      for input_register in [false, true] {
        for output_register in [false, true] {
          invariants_hold(ports, outstanding, input_register, output_register);
        }
      }
    }
  }
}
