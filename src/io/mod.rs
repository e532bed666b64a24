mod input;
mod output;
mod recycler;

pub(crate) use input::ByteInput;
pub(crate) use output::ByteOutput;
