//! [`Codec`]: encode/decode application types via an [`Ops`] capability,
//! optional in the core and used internally by rewrite-at-type rules that
//! need to turn a native value into (or out of) an encoded `T`. Nothing
//! else in this crate requires a `Codec` to exist for a given type.
//!
//! Failures flow through a plain `Result<_, CodecError>` (see `spec.md`
//! §7: `Ops`/`Codec` are the two surfaces documented as plain-`Result`
//! domain errors, distinct from [`crate::result::DataResult`]'s
//! partial-value carrying). `map`/`flatMap`-shaped composition is already
//! covered by [`std::result::Result::map`]/[`std::result::Result::and_then`]
//! on the values `decode`/`encode` return; [`Codec::xmap`], [`field_of`],
//! and [`optional_field_of`] are the combinators that need dedicated
//! support, since they cross between two different value types or splice
//! a codec into a named map field.

use std::sync::Arc;

use crate::error::CodecError;
use crate::ops::Ops;
use crate::pair::Pair;

pub type CodecResult<A> = Result<A, CodecError>;

/// Turns an application value into an encoded `T`, merging it into
/// `prefix` (so several fields can be encoded into the same growing map).
pub trait Encoder<T, A>: Send + Sync {
    fn encode(&self, ops: &dyn Ops<T>, value: &A, prefix: T) -> CodecResult<T>;
}

/// Reads an application value out of an encoded `T`, alongside whatever of
/// `input` the read didn't consume.
pub trait Decoder<T, A>: Send + Sync {
    fn decode(&self, ops: &dyn Ops<T>, input: &T) -> CodecResult<Pair<A, T>>;
}

impl<T, A, F> Encoder<T, A> for F
where
    F: Fn(&dyn Ops<T>, &A, T) -> CodecResult<T> + Send + Sync,
{
    fn encode(&self, ops: &dyn Ops<T>, value: &A, prefix: T) -> CodecResult<T> {
        self(ops, value, prefix)
    }
}

impl<T, A, F> Decoder<T, A> for F
where
    F: Fn(&dyn Ops<T>, &T) -> CodecResult<Pair<A, T>> + Send + Sync,
{
    fn decode(&self, ops: &dyn Ops<T>, input: &T) -> CodecResult<Pair<A, T>> {
        self(ops, input)
    }
}

/// An [`Encoder`] and [`Decoder`] for the same `(T, A)`, held as trait
/// objects so one can be built from another (see [`Codec::xmap`]) without
/// naming the closure types involved. Cheap to `Clone`: both halves are
/// reference-counted.
pub struct Codec<T, A> {
    encoder: Arc<dyn Encoder<T, A>>,
    decoder: Arc<dyn Decoder<T, A>>,
}

impl<T, A> Clone for Codec<T, A> {
    fn clone(&self) -> Self {
        Codec {
            encoder: Arc::clone(&self.encoder),
            decoder: Arc::clone(&self.decoder),
        }
    }
}

impl<T, A> Codec<T, A> {
    pub fn new(encoder: impl Encoder<T, A> + 'static, decoder: impl Decoder<T, A> + 'static) -> Self {
        Codec {
            encoder: Arc::new(encoder),
            decoder: Arc::new(decoder),
        }
    }

    pub fn decode(&self, ops: &dyn Ops<T>, input: &T) -> CodecResult<Pair<A, T>> {
        self.decoder.decode(ops, input)
    }

    pub fn encode(&self, ops: &dyn Ops<T>, value: &A, prefix: T) -> CodecResult<T> {
        self.encoder.encode(ops, value, prefix)
    }

    /// `decode(ops, input)`, keeping only the decoded value.
    pub fn parse(&self, ops: &dyn Ops<T>, input: &T) -> CodecResult<A> {
        self.decode(ops, input).map(Pair::into_first)
    }
}

impl<T: Clone + 'static, A: 'static> Codec<T, A> {
    /// Bidirectional remap to a different application type: `f` transforms
    /// a successfully decoded value, `g` reconstructs the original `A`
    /// before encoding. Neither side sees the other: a decode failure
    /// never calls `g`, and vice versa.
    pub fn xmap<B: 'static>(self, f: impl Fn(A) -> B + Send + Sync + 'static, g: impl Fn(&B) -> A + Send + Sync + 'static) -> Codec<T, B> {
        let for_decode = self.clone();
        let decode_fn = move |ops: &dyn Ops<T>, input: &T| -> CodecResult<Pair<B, T>> {
            for_decode.decode(ops, input).map(|pair| Pair::new(f(pair.first), pair.second))
        };
        let for_encode = self;
        let encode_fn = move |ops: &dyn Ops<T>, value: &B, prefix: T| -> CodecResult<T> { for_encode.encode(ops, &g(value), prefix) };
        Codec::new(encode_fn, decode_fn)
    }
}

/// `inner` nested under map key `name`: `decode` reads `input.get(name)`
/// and parses it, returning `input` itself as the remainder (a field read
/// is a lookup, not a consuming step, unlike decoding a positional list);
/// `encode` merges the encoded field into `prefix`, which must already be
/// map-shaped.
pub fn field_of<T: Clone + 'static, A: 'static>(name: impl Into<String>, inner: Codec<T, A>) -> Codec<T, A> {
    let name = name.into();

    let decode_name = name.clone();
    let decoder = inner.clone();
    let decode_fn = move |ops: &dyn Ops<T>, input: &T| -> CodecResult<Pair<A, T>> {
        let key = ops.create_string(&decode_name);
        let field_value = ops.get(input, &key)?;
        let decoded = decoder.decode(ops, &field_value)?;
        Ok(Pair::new(decoded.first, input.clone()))
    };

    let encoder = inner;
    let encode_fn = move |ops: &dyn Ops<T>, value: &A, prefix: T| -> CodecResult<T> {
        let field_value = encoder.encode(ops, value, ops.empty())?;
        let key = ops.create_string(&name);
        Ok(ops.merge_to_map(&prefix, key, field_value)?)
    };

    Codec::new(encode_fn, decode_fn)
}

/// As [`field_of`], but an absent key decodes to `None` instead of an
/// error, and encoding `None` leaves `prefix` untouched, the usual shape
/// for a field a migration has just made optional.
pub fn optional_field_of<T: Clone + 'static, A: 'static>(name: impl Into<String>, inner: Codec<T, A>) -> Codec<T, Option<A>> {
    let name = name.into();

    let decode_name = name.clone();
    let decoder = inner.clone();
    let decode_fn = move |ops: &dyn Ops<T>, input: &T| -> CodecResult<Pair<Option<A>, T>> {
        let key = ops.create_string(&decode_name);
        match ops.get(input, &key) {
            Ok(field_value) => {
                let decoded = decoder.decode(ops, &field_value)?;
                Ok(Pair::new(Some(decoded.first), input.clone()))
            }
            Err(_) => Ok(Pair::new(None, input.clone())),
        }
    };

    let encoder = inner;
    let encode_fn = move |ops: &dyn Ops<T>, value: &Option<A>, prefix: T| -> CodecResult<T> {
        match value {
            None => Ok(prefix),
            Some(v) => {
                let field_value = encoder.encode(ops, v, ops.empty())?;
                let key = ops.create_string(&name);
                Ok(ops.merge_to_map(&prefix, key, field_value)?)
            }
        }
    };

    Codec::new(encode_fn, decode_fn)
}
