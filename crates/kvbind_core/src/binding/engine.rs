//! Load, write-through and external propagation for a single binding.

use super::{BindOptions, BindingState, ErrorHook, LoadOutcome, UpdatedHook};
use crate::change_feed::{ChangeEvent, ChangeListener};
use crate::context::{BindingRecord, ContextInner};
use crate::error::{SyncError, SyncResult};
use crate::gateway::{RawStore, WriteOutcome};
use crate::observable::{Reactive, ValueListener};
use kvbind_codec::{is_different, is_different_opt, Codec, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub(crate) fn bind<T, R>(
    ctx: &Arc<ContextInner>,
    key: &str,
    observable: &R,
    codec: Codec<T>,
    options: BindOptions<T>,
) -> SyncResult<LoadOutcome>
where
    T: Clone + Send + Sync + 'static,
    R: Reactive<T> + Clone + 'static,
{
    let gateway = ctx.gateway()?;
    ctx.unbind(key);

    let id = ctx.next_binding_id();
    let watch_store = options.watch_store.unwrap_or(ctx.config.watch_store);

    // Subscriptions go in before the initial assignment; the load holds the
    // key's lock so they skip it.
    let mut subscriptions = Vec::new();
    if options.auto_sync {
        subscriptions.push(observable.subscribe(write_through_listener(
            ctx,
            key,
            codec.clone(),
            options.on_updated.clone(),
            options.on_error.clone(),
        )));
    }
    if watch_store {
        subscriptions.push(ctx.feed.subscribe(
            key,
            external_listener(
                ctx,
                key,
                observable.clone(),
                codec.clone(),
                options.default_value.clone(),
                options.on_error.clone(),
            ),
        ));
    }
    ctx.insert_binding(
        key,
        BindingRecord {
            id,
            state: BindingState::Loading,
            subscriptions,
        },
    );

    let loaded = {
        let _lock = ctx.locks.try_acquire(key);
        let _origin = ctx.mark_propagating(key);
        load(ctx, &gateway, key, observable, &codec, &options)
    };

    let (outcome, value) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            ctx.unbind(key);
            report_error(ctx, key, &e, options.on_error.as_ref());
            return Err(e);
        }
    };

    ctx.set_binding_state(key, id, outcome.state());
    if let Some(hook) = &options.on_loaded {
        hook(value.as_ref());
    }
    if options.auto_sync {
        ctx.set_binding_state(key, id, BindingState::Syncing);
    }
    debug!(key = %key, outcome = ?outcome, watch_store, "binding loaded");
    Ok(outcome)
}

/// Performs the initial load. Runs with the key locked.
fn load<T, R>(
    ctx: &ContextInner,
    gateway: &RawStore,
    key: &str,
    observable: &R,
    codec: &Codec<T>,
    options: &BindOptions<T>,
) -> SyncResult<(LoadOutcome, Option<T>)>
where
    T: Clone,
    R: Reactive<T>,
{
    let Some(raw) = gateway.read(key)? else {
        return match &options.default_value {
            Some(default) => {
                apply_default(ctx, gateway, key, observable, codec, default)?;
                Ok((LoadOutcome::Defaulted, Some(default.clone())))
            }
            None => Ok((LoadOutcome::Empty, None)),
        };
    };

    match codec.decode(&raw) {
        Ok(value) => {
            let target = codec.encode(&value).unwrap_or(raw);
            let current = codec.encode(&observable.get()).ok();
            if is_different_opt(current.as_ref(), Some(&target)) {
                observable.set(value.clone());
            }
            Ok((LoadOutcome::Loaded, Some(value)))
        }
        Err(e) => {
            ctx.stats.record_decode_failure();
            let err = SyncError::codec(key, e);
            report_error(ctx, key, &err, options.on_error.as_ref());
            match &options.default_value {
                Some(default) => {
                    warn!(key = %key, "replacing undecodable value with default");
                    apply_default(ctx, gateway, key, observable, codec, default)?;
                    Ok((LoadOutcome::RecoveredWithDefault, Some(default.clone())))
                }
                None => Ok((LoadOutcome::Failed, None)),
            }
        }
    }
}

fn apply_default<T, R>(
    ctx: &ContextInner,
    gateway: &RawStore,
    key: &str,
    observable: &R,
    codec: &Codec<T>,
    default: &T,
) -> SyncResult<()>
where
    T: Clone,
    R: Reactive<T>,
{
    let encoded = codec.encode(default).map_err(|e| SyncError::codec(key, e))?;
    observable.set(default.clone());
    gateway.write(key, encoded)?;
    ctx.stats.record_default_applied();
    Ok(())
}

fn write_through_listener<T>(
    ctx: &Arc<ContextInner>,
    key: &str,
    codec: Codec<T>,
    on_updated: Option<UpdatedHook<T>>,
    on_error: Option<ErrorHook>,
) -> ValueListener<T>
where
    T: Send + Sync + 'static,
{
    let weak = Arc::downgrade(ctx);
    let key = key.to_string();
    Arc::new(move |value: &T| {
        if let Some(ctx) = weak.upgrade() {
            write_through(&ctx, &key, &codec, value, on_updated.as_ref(), on_error.as_ref());
        }
    })
}

/// Writes one observable mutation through to the store.
fn write_through<T>(
    ctx: &ContextInner,
    key: &str,
    codec: &Codec<T>,
    value: &T,
    on_updated: Option<&UpdatedHook<T>>,
    on_error: Option<&ErrorHook>,
) {
    if ctx.locks.is_locked(key) {
        ctx.stats.record_skipped_locked();
        debug!(key = %key, "mutation skipped, key is locked");
        return;
    }
    let Some(_lock) = ctx.locks.try_acquire(key) else {
        ctx.stats.record_skipped_locked();
        return;
    };
    let _origin = ctx.mark_propagating(key);

    let result = ctx.gateway().and_then(|gateway| {
        let encoded = codec.encode(value).map_err(|e| SyncError::codec(key, e))?;
        gateway.write_if_changed(key, encoded)
    });

    match result {
        Ok(outcome) => {
            if outcome == WriteOutcome::Unchanged {
                debug!(key = %key, "value unchanged, write skipped");
            }
            if let Some(hook) = on_updated {
                hook(value);
            }
        }
        Err(e) => report_error(ctx, key, &e, on_error),
    }
}

fn external_listener<T, R>(
    ctx: &Arc<ContextInner>,
    key: &str,
    observable: R,
    codec: Codec<T>,
    default_value: Option<T>,
    on_error: Option<ErrorHook>,
) -> ChangeListener
where
    T: Clone + Send + Sync + 'static,
    R: Reactive<T> + 'static,
{
    let weak = Arc::downgrade(ctx);
    let key = key.to_string();
    Arc::new(move |event: &ChangeEvent| {
        if let Some(ctx) = weak.upgrade() {
            propagate_external(
                &ctx,
                &key,
                &observable,
                &codec,
                default_value.as_ref(),
                event,
                on_error.as_ref(),
            );
        }
    })
}

/// Pushes a store change made elsewhere into the observable.
fn propagate_external<T, R>(
    ctx: &ContextInner,
    key: &str,
    observable: &R,
    codec: &Codec<T>,
    default_value: Option<&T>,
    event: &ChangeEvent,
    on_error: Option<&ErrorHook>,
) where
    T: Clone,
    R: Reactive<T>,
{
    if ctx.is_propagating(key) {
        return;
    }
    let Some(_lock) = ctx.locks.try_acquire(key) else {
        return;
    };

    let next = match &event.new_value {
        Some(stored) => match codec.decode(stored) {
            Ok(value) => Some((value, stored.clone())),
            Err(e) => {
                ctx.stats.record_decode_failure();
                report_error(ctx, key, &SyncError::codec(key, e), on_error);
                None
            }
        },
        None => default_value.and_then(|d| codec.encode(d).ok().map(|v| (d.clone(), v))),
    };
    let Some((value, stored)) = next else {
        return;
    };

    let current: Option<Value> = codec.encode(&observable.get()).ok();
    let changed = match &current {
        Some(current) => is_different(current, &stored),
        None => true,
    };
    if changed {
        observable.set(value);
        ctx.stats.record_external_update();
        debug!(key = %key, "external change applied");
    }
}

fn report_error(ctx: &ContextInner, key: &str, err: &SyncError, hook: Option<&ErrorHook>) {
    ctx.stats.record_error();
    if err.is_decode() {
        warn!(key = %key, error = %err, "binding recovered from decode failure");
    } else {
        error!(key = %key, error = %err, "sync failed");
    }
    if let Some(hook) = hook {
        hook(err);
    }
}
