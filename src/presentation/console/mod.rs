mod transcript_printer;

pub use transcript_printer::TranscriptPrinter;
