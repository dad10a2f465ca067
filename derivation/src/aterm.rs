//! ATerm representation of a derivation: `Derive(outputs, inputDrvs,
//! inputSrcs, system, builder, args, env)`.
//!
//! Parsing is a small recursive-descent [nom] parser over exactly this
//! grammar — there is no generic ATerm evaluator, and nothing here ever
//! dispatches to one. [`format`] is the literal inverse: same field order,
//! same escaping, same framing, so that `format(parse(t)) == t` for any
//! well-formed derivation ATerm.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write as _;

use laut_compat::aterm::{escape_bytes, parse_string_field, parse_string_list};
use nom::bytes::complete::tag;
use nom::character::complete::char as nomchar;
use nom::combinator::all_consuming;
use nom::multi::separated_list0;
use nom::sequence::{delimited, terminated, tuple};
use nom::IResult;
use thiserror::Error;

pub const DERIVE_PREFIX: &str = "Derive";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtermOutput {
    pub path: String,
    /// Hash algorithm, optionally prefixed with `r:` for recursive (NAR)
    /// hashing. Empty when the output carries no declared hash.
    pub hash_algo: String,
    /// Hex-encoded digest. Empty when the output carries no declared hash.
    pub hash: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtermDerivation {
    pub outputs: BTreeMap<String, AtermOutput>,
    pub input_drvs: BTreeMap<String, BTreeSet<String>>,
    pub input_srcs: BTreeSet<String>,
    pub system: String,
    pub builder: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid aterm: could not parse derivation")]
    InvalidATerm,
}

/// Parses the ATerm serialization of a derivation.
pub fn parse(input: &[u8]) -> Result<AtermDerivation, Error> {
    all_consuming(parse_derive)(input)
        .map(|(_, drv)| drv)
        .map_err(|_| Error::InvalidATerm)
}

fn parse_derive(i: &[u8]) -> IResult<&[u8], AtermDerivation> {
    let (i, _) = tag(DERIVE_PREFIX.as_bytes())(i)?;
    delimited(
        nomchar('('),
        |i| {
            let (i, outputs) = terminated(parse_outputs, nomchar(','))(i)?;
            let (i, input_drvs) = terminated(parse_input_drvs, nomchar(','))(i)?;
            let (i, input_srcs) = terminated(parse_string_list, nomchar(','))(i)?;
            let (i, system) = terminated(parse_string_field, nomchar(','))(i)?;
            let (i, builder) = terminated(parse_string_field, nomchar(','))(i)?;
            let (i, args) = terminated(parse_string_list, nomchar(','))(i)?;
            let (i, env) = parse_env(i)?;

            Ok((
                i,
                AtermDerivation {
                    outputs,
                    input_drvs,
                    input_srcs: input_srcs.into_iter().collect(),
                    system,
                    builder,
                    args,
                    env,
                },
            ))
        },
        nomchar(')'),
    )(i)
}

fn parse_output(i: &[u8]) -> IResult<&[u8], (String, AtermOutput)> {
    delimited(
        nomchar('('),
        |i| {
            let (i, name) = terminated(parse_string_field, nomchar(','))(i)?;
            let (i, path) = terminated(parse_string_field, nomchar(','))(i)?;
            let (i, hash_algo) = terminated(parse_string_field, nomchar(','))(i)?;
            let (i, hash) = parse_string_field(i)?;
            Ok((
                i,
                (
                    name,
                    AtermOutput {
                        path,
                        hash_algo,
                        hash,
                    },
                ),
            ))
        },
        nomchar(')'),
    )(i)
}

fn parse_outputs(i: &[u8]) -> IResult<&[u8], BTreeMap<String, AtermOutput>> {
    let (i, items) = delimited(
        nomchar('['),
        separated_list0(nomchar(','), parse_output),
        nomchar(']'),
    )(i)?;
    Ok((i, items.into_iter().collect()))
}

fn parse_input_drv(i: &[u8]) -> IResult<&[u8], (String, BTreeSet<String>)> {
    delimited(
        nomchar('('),
        |i| {
            let (i, path) = terminated(parse_string_field, nomchar(','))(i)?;
            let (i, outputs) = parse_string_list(i)?;
            Ok((i, (path, outputs.into_iter().collect())))
        },
        nomchar(')'),
    )(i)
}

fn parse_input_drvs(i: &[u8]) -> IResult<&[u8], BTreeMap<String, BTreeSet<String>>> {
    let (i, items) = delimited(
        nomchar('['),
        separated_list0(nomchar(','), parse_input_drv),
        nomchar(']'),
    )(i)?;
    Ok((i, items.into_iter().collect()))
}

fn parse_env_pair(i: &[u8]) -> IResult<&[u8], (String, String)> {
    delimited(
        nomchar('('),
        |i| {
            let (i, k) = terminated(parse_string_field, nomchar(','))(i)?;
            let (i, v) = parse_string_field(i)?;
            Ok((i, (k, v)))
        },
        nomchar(')'),
    )(i)
}

fn parse_env(i: &[u8]) -> IResult<&[u8], BTreeMap<String, String>> {
    let (i, items) = delimited(
        nomchar('['),
        separated_list0(nomchar(','), parse_env_pair),
        nomchar(']'),
    )(i)?;
    Ok((i, items.into_iter().collect()))
}

/// Builds the ATerm view of a derivation from its typed JSON form. Used to
/// compute the ATerm-based resolved input hash when the only thing on hand
/// is the evaluator's JSON.
pub fn from_derivation_json(d: &crate::json::DerivationJson) -> AtermDerivation {
    let outputs = d
        .outputs
        .iter()
        .map(|(name, o)| {
            (
                name.clone(),
                AtermOutput {
                    path: o.path.clone().unwrap_or_default(),
                    hash_algo: o.hash_algo.clone().unwrap_or_default(),
                    hash: o.hash.clone().unwrap_or_default(),
                },
            )
        })
        .collect();

    AtermDerivation {
        outputs,
        input_drvs: d.input_drvs.clone(),
        input_srcs: d.input_srcs.clone(),
        system: d.system.clone(),
        builder: d.builder.clone(),
        args: d.args.clone(),
        env: d.env.clone(),
    }
}

/// Serializes a derivation to the canonical ATerm form: the literal inverse
/// of [`parse`].
pub fn format(drv: &AtermDerivation) -> Vec<u8> {
    let mut out = Vec::new();
    write_all(drv, &mut out).expect("writing to a Vec never fails");
    out
}

fn write_field(out: &mut Vec<u8>, s: impl AsRef<[u8]>) -> std::io::Result<()> {
    out.write_all(b"\"")?;
    out.write_all(&escape_bytes(s))?;
    out.write_all(b"\"")?;
    Ok(())
}

fn write_list<T>(
    out: &mut Vec<u8>,
    items: impl IntoIterator<Item = T>,
    mut write_item: impl FnMut(&mut Vec<u8>, T) -> std::io::Result<()>,
) -> std::io::Result<()> {
    out.write_all(b"[")?;
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        write_item(out, item)?;
    }
    out.write_all(b"]")?;
    Ok(())
}

fn write_all(drv: &AtermDerivation, out: &mut Vec<u8>) -> std::io::Result<()> {
    out.write_all(DERIVE_PREFIX.as_bytes())?;
    out.write_all(b"(")?;

    write_list(out, drv.outputs.iter(), |out, (name, output)| {
        out.write_all(b"(")?;
        write_field(out, name)?;
        out.write_all(b",")?;
        write_field(out, &output.path)?;
        out.write_all(b",")?;
        write_field(out, &output.hash_algo)?;
        out.write_all(b",")?;
        write_field(out, &output.hash)?;
        out.write_all(b")")?;
        Ok(())
    })?;
    out.write_all(b",")?;

    write_list(out, drv.input_drvs.iter(), |out, (path, outputs)| {
        out.write_all(b"(")?;
        write_field(out, path)?;
        out.write_all(b",")?;
        write_list(out, outputs.iter(), |out, name| write_field(out, name))?;
        out.write_all(b")")?;
        Ok(())
    })?;
    out.write_all(b",")?;

    write_list(out, drv.input_srcs.iter(), |out, path| write_field(out, path))?;
    out.write_all(b",")?;

    write_field(out, &drv.system)?;
    out.write_all(b",")?;
    write_field(out, &drv.builder)?;
    out.write_all(b",")?;

    write_list(out, drv.args.iter(), |out, arg| write_field(out, arg))?;
    out.write_all(b",")?;

    write_list(out, drv.env.iter(), |out, (k, v)| {
        out.write_all(b"(")?;
        write_field(out, k)?;
        out.write_all(b",")?;
        write_field(out, v)?;
        out.write_all(b")")?;
        Ok(())
    })?;

    out.write_all(b")")?;
    Ok(())
}
