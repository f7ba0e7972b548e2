/// Skid buffer for valid/ready channels
///
/// Two registers: `main` drives the output, `temp` catches the beat that
/// arrives while the output is stalled. `in_ready` only depends on registered
/// state, which breaks the combinational ready path.
#[derive(Debug, Clone)]
pub struct SkidBuffer<T: Clone> {
  main: Option<T>,
  temp: Option<T>,
}

impl<T: Clone> SkidBuffer<T> {
  pub fn new() -> Self {
    Self { main: None, temp: None }
  }

  pub fn in_ready(&self) -> bool {
    self.temp.is_none()
  }

  /// Output beat presented downstream this cycle
  pub fn peek(&self) -> Option<&T> {
    self.main.as_ref()
  }

  pub fn is_empty(&self) -> bool {
    self.main.is_none() && self.temp.is_none()
  }

  pub fn len(&self) -> usize {
    self.main.is_some() as usize + self.temp.is_some() as usize
  }

  /// Clock edge: `popped` when the output fired, `pushed` when the input fired
  pub fn tick(&mut self, pushed: Option<T>, popped: bool) {
    if popped {
      self.main = self.temp.take();
    }
    if let Some(beat) = pushed {
      if self.main.is_none() {
        self.main = Some(beat);
      } else {
        debug_assert!(self.temp.is_none(), "skid buffer overrun");
        self.temp = Some(beat);
      }
    }
  }

  pub fn clear(&mut self) {
    self.main = None;
    self.temp = None;
  }
}

impl<T: Clone> Default for SkidBuffer<T> {
  fn default() -> Self {
    Self::new()
  }
}
