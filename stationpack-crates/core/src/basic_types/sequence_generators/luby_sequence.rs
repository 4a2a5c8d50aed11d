use super::SequenceGenerator;

// The Luby sequence 1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8, ... scaled by `base_value`.
// Each element is produced in constant time with Knuth's 'reluctant doubling' formula.
#[derive(Debug, Copy, Clone)]
pub(crate) struct LubySequence {
    u: i64,
    v: i64,
    base_value: u64,
}

impl LubySequence {
    pub(crate) fn new(base_value: u64) -> LubySequence {
        LubySequence {
            u: 1,
            v: 1,
            base_value,
        }
    }
}

impl SequenceGenerator for LubySequence {
    fn next(&mut self) -> u64 {
        let next_value = self.v as u64;
        if (self.u & (-self.u)) == self.v {
            self.u += 1;
            self.v = 1;
        } else {
            self.v *= 2;
        }
        next_value.saturating_mul(self.base_value)
    }
}
