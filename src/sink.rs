use crate::error::MergeError;
use crate::model::{CellStyle, CellValue};

#[cfg(test)]
pub(crate) use memory::MemorySheet;

/// Destination of merged cells, addressed by zero-based row and column.
pub trait SheetSink {
    fn write_cell(
        &mut self,
        row: u32,
        col: u16,
        value: &CellValue,
        style: &CellStyle,
    ) -> Result<(), MergeError>;
}
