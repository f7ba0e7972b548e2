/// Round-robin grant primitive
///
/// Grants are one-hot `u32` vectors over requester ids, so at most 32
/// requesters are supported.
pub const MAX_REQUESTERS: usize = 32;

fn lane_mask(n: usize) -> u64 {
  (1u64 << n) - 1
}

/// Compute the next one-hot grant from a request set and the previous grant.
///
/// The request vector is doubled so the search can wrap, the previous grant is
/// rotated left by one, and `double & !(double - rot)` isolates the lowest
/// request at or after the rotated position. An empty request set keeps the
/// previous grant.
pub fn next_grant(requests: u32, last_grant: u32, n: usize) -> u32 {
  assert!(n >= 1 && n <= MAX_REQUESTERS, "requester count {} out of range", n);
  let mask = lane_mask(n);
  let req = requests as u64 & mask;
  if req == 0 {
    return last_grant;
  }

  let last = match last_grant as u64 & mask {
    0 => 1,
    g => g,
  };
  let rot = ((last << 1) | (last >> (n - 1))) & mask;

  let double = req | (req << n);
  let pick = double & !double.wrapping_sub(rot);
  ((pick | (pick >> n)) & mask) as u32
}

/// Index of the set bit in a one-hot grant
pub fn grant_index(one_hot: u32) -> usize {
  one_hot.trailing_zeros() as usize
}

/// Grant register with round-robin update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRobin {
  n: usize,
  grant: u32,
}

impl RoundRobin {
  pub fn new(n: usize) -> Self {
    assert!(n >= 1 && n <= MAX_REQUESTERS, "requester count {} out of range", n);
    Self { n, grant: 1 }
  }

  pub fn grant(&self) -> u32 {
    self.grant
  }

  /// Currently selected requester
  pub fn selected(&self) -> usize {
    grant_index(self.grant)
  }

  pub fn len(&self) -> usize {
    self.n
  }

  pub fn is_empty(&self) -> bool {
    self.n == 0
  }

  /// Make one arbitration decision and return the new selection
  pub fn advance(&mut self, requests: u32) -> usize {
    self.grant = next_grant(requests, self.grant, self.n);
    self.selected()
  }

  pub fn reset(&mut self) {
    self.grant = 1;
  }
}
