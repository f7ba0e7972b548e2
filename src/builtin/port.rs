/// Port and signal types for module interconnection

/// A wire/signal that carries data between modules
/// Every wire carries its own valid flag
#[derive(Debug, Clone, PartialEq)]
pub struct Wire<T: Clone> {
  pub value: T,
  pub valid: bool,
}

impl<T: Clone> Wire<T> {
  pub fn new(value: T) -> Self {
    Self { value, valid: false }
  }

  pub fn set(&mut self, value: T) {
    self.value = value;
    self.valid = true;
  }

  pub fn clear(&mut self) {
    self.valid = false;
  }

  /// Drive the wire from an optional value, clearing it on `None`
  pub fn drive(&mut self, value: Option<T>) {
    match value {
      Some(v) => self.set(v),
      None => self.clear(),
    }
  }

  pub fn get(&self) -> Option<&T> {
    if self.valid {
      Some(&self.value)
    } else {
      None
    }
  }
}

impl<T: Clone + Default> Default for Wire<T> {
  fn default() -> Self {
    Self {
      value: T::default(),
      valid: false,
    }
  }
}

/// A valid/ready handshake channel
///
/// The sender drives `data`, the receiver drives `ready`. A transfer happens
/// in the cycle where both are asserted.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel<T: Clone> {
  pub data: Wire<T>,
  pub ready: bool,
}

impl<T: Clone> Channel<T> {
  pub fn fire(&self) -> bool {
    self.data.valid && self.ready
  }

  /// Payload transferred this cycle, if any
  pub fn fired(&self) -> Option<&T> {
    if self.fire() {
      Some(&self.data.value)
    } else {
      None
    }
  }

  /// Copy the sender-driven half (valid + payload) from `other`
  pub fn forward_from(&mut self, other: &Channel<T>) {
    self.data = other.data.clone();
  }

  /// Copy the receiver-driven half (ready) from `other`
  pub fn backward_from(&mut self, other: &Channel<T>) {
    self.ready = other.ready;
  }
}

impl<T: Clone + Default> Default for Channel<T> {
  fn default() -> Self {
    Self {
      data: Wire::default(),
      ready: false,
    }
  }
}
