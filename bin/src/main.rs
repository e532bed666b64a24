use anyhow::Context;
use cbor_stream::{copy_events, Decoder, Encoder, Event, NumberType, SizingEncoder};
use clap::Parser;
use std::{
    fs::File,
    io::{stdin, stdout, Read, Write},
};

#[derive(Parser, Debug)]
struct Args {
    /// Input file to process; use "-" for stdin
    #[clap(short, long, default_value = "-")]
    input: String,

    /// Output file to write; use "-" for stdout
    #[clap(short, long, default_value = "-")]
    output: String,

    /// Print the decoded event stream as text instead of re-encoding
    #[clap(short, long)]
    events: bool,

    /// Re-encode with definite-length containers (via the sizing encoder);
    /// the default re-encodes with indefinite-length framing
    #[clap(short, long)]
    sized: bool,

    /// Do not print any diagnostic output to stderr
    #[clap(short, long)]
    quiet: bool,
}

fn dump_events(
    decoder: &mut Decoder<Box<dyn Read>>,
    output: &mut dyn Write,
) -> anyhow::Result<u64> {
    let mut count = 0u64;
    let mut indent = 0usize;
    while let Some(ev) = decoder.next_event()? {
        count += 1;
        if ev.is_container_end() {
            indent = indent.saturating_sub(1);
        }
        write!(output, "{:indent$}", "", indent = indent * 2)?;
        match ev {
            Event::StartArray => writeln!(output, "[")?,
            Event::EndArray => writeln!(output, "]")?,
            Event::StartObject => writeln!(output, "{{")?,
            Event::EndObject => writeln!(output, "}}")?,
            Event::FieldName => writeln!(output, "{:?}:", decoder.text()?)?,
            Event::Text => writeln!(output, "{:?}", decoder.text()?)?,
            Event::Bytes => {
                write!(output, "h'")?;
                for byte in decoder.binary()? {
                    write!(output, "{:02x}", byte)?;
                }
                writeln!(output, "'")?;
            }
            Event::Int => match decoder.number_type() {
                Some(NumberType::BigInt) => writeln!(output, "{}", decoder.to_big_int()?)?,
                _ => writeln!(output, "{}", decoder.to_i64()?)?,
            },
            Event::Float => match decoder.number_type() {
                Some(NumberType::BigDecimal) => {
                    writeln!(output, "{}", decoder.to_big_decimal()?)?
                }
                _ => writeln!(output, "{}", decoder.to_f64()?)?,
            },
            Event::Bool(b) => writeln!(output, "{}", b)?,
            Event::Null => writeln!(output, "null")?,
        }
        if ev.is_container_start() {
            indent += 1;
        }
    }
    Ok(count)
}

fn main() {
    let args = Args::parse();

    let input = if args.input == "-" {
        Box::new(stdin()) as Box<dyn Read>
    } else {
        Box::new(
            File::open(&args.input)
                .context(format!("opening input file `{}`", args.input))
                .unwrap(),
        )
    };
    let mut output = if args.output == "-" {
        Box::new(stdout()) as Box<dyn Write>
    } else {
        Box::new(
            File::create(&args.output)
                .context(format!("opening output file `{}`", args.output))
                .unwrap(),
        )
    };

    let mut decoder = Decoder::new(input);
    let count = if args.events {
        dump_events(&mut decoder, &mut output)
            .context("dumping events")
            .unwrap()
    } else if args.sized {
        let mut encoder = SizingEncoder::new(Encoder::new(&mut output));
        copy_events(&mut decoder, &mut encoder)
            .context("re-encoding input")
            .unwrap();
        encoder.close().context("closing encoder").unwrap();
        0
    } else {
        let mut encoder = Encoder::new(&mut output);
        copy_events(&mut decoder, &mut encoder)
            .context("re-encoding input")
            .unwrap();
        encoder.close().context("closing encoder").unwrap();
        0
    };

    if !args.quiet && args.events {
        eprintln!("Processed {} events", count);
    }
}
