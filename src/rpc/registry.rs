// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The function registry: maps a stable `fn_id` to a typed handler (§4.2).
//!
//! Handlers are ordinary `async fn`s over their own argument types plus a
//! trailing [`CallContext`]. The argument tuple (everything but the
//! context) is the archive that travels on the wire, symmetric between
//! caller and callee via `bincode`. [`TypedHandler`] erases the concrete
//! argument arity behind [`ErasedHandler`] so the registry can hold one
//! homogeneous map; the `impl_typed_handler!` macro below generates that
//! erasure for arities 0 through 4, which is as far as any handler in this
//! codebase reaches.

use std::{collections::HashMap, future::Future, marker::PhantomData, pin::Pin, sync::Arc};

use anyhow::{Result, bail};
use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::rpc::{context::CallContext, result::RpcResult};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered handler, with its argument arity erased.
pub trait ErasedHandler: Send + Sync {
    fn call(&self, body: Bytes, ctx: CallContext) -> BoxFuture<'static, RpcResult>;
}

/// Wraps a typed closure/fn so it can be stored behind `dyn ErasedHandler`.
/// `Args` is the argument tuple decoded from the wire archive; it never
/// includes `CallContext`, which the engine supplies out of band.
pub struct TypedHandler<F, Args> {
    f: F,
    _marker: PhantomData<fn(Args)>,
}

impl<F, Args> TypedHandler<F, Args> {
    pub fn new(f: F) -> Self {
        Self { f, _marker: PhantomData }
    }
}

macro_rules! impl_typed_handler {
    ( $( $A:ident ),* ) => {
        impl<F, Fut, $($A,)*> ErasedHandler for TypedHandler<F, ($($A,)*)>
        where
            F: Fn($($A,)* CallContext) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = RpcResult> + Send + 'static,
            $($A: DeserializeOwned + Send + 'static,)*
        {
            #[allow(non_snake_case, unused_variables)]
            fn call(&self, body: Bytes, ctx: CallContext) -> BoxFuture<'static, RpcResult> {
                match bincode::deserialize::<($($A,)*)>(&body) {
                    Ok(( $($A,)* )) => {
                        let fut = (self.f)($($A,)* ctx);
                        Box::pin(fut)
                    }
                    Err(_) => Box::pin(async { RpcResult::final_err(crate::error::EngineError::BadRequest) }),
                }
            }
        }
    };
}

impl_typed_handler!();
impl_typed_handler!(A1);
impl_typed_handler!(A1, A2);
impl_typed_handler!(A1, A2, A3);
impl_typed_handler!(A1, A2, A3, A4);

/// Maps `fn_id` to a registered handler. Registration is append-only and
/// rejects duplicate ids (§4.2): there is exactly one owner per id, decided
/// once at startup.
#[derive(Default)]
pub struct FunctionRegistry {
    handlers: HashMap<i32, Arc<dyn ErasedHandler>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `fn_id`. Negative ids are reserved for the
    /// built-in resume dispatcher (§4.3) and are rejected here.
    pub fn register<H>(&mut self, fn_id: i32, handler: H) -> Result<()>
    where H: ErasedHandler + 'static {
        if fn_id < 0 {
            bail!("fn_id {fn_id} is reserved for the built-in resume dispatcher");
        }
        if self.handlers.contains_key(&fn_id) {
            bail!("fn_id {fn_id} is already registered");
        }
        self.handlers.insert(fn_id, Arc::new(handler));
        Ok(())
    }

    pub fn get(&self, fn_id: i32) -> Option<Arc<dyn ErasedHandler>> {
        self.handlers.get(&fn_id).cloned()
    }

    pub fn contains(&self, fn_id: i32) -> bool {
        self.handlers.contains_key(&fn_id)
    }
}
