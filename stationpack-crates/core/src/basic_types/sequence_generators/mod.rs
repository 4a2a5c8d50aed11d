mod luby_sequence;

pub(crate) use luby_sequence::LubySequence;

/// A source of restart intervals.
pub(crate) trait SequenceGenerator {
    fn next(&mut self) -> u64;
}
