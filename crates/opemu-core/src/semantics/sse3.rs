use super::float::SseFloat;
use super::{horizontal, EmulationContext};
use crate::vector::Vector;

pub fn haddps(ctx: &EmulationContext) -> Vector {
    horizontal::<f32>(ctx, f32::sse_add)
}

pub fn hsubps(ctx: &EmulationContext) -> Vector {
    horizontal::<f32>(ctx, f32::sse_sub)
}

pub fn haddpd(ctx: &EmulationContext) -> Vector {
    horizontal::<f64>(ctx, f64::sse_add)
}

pub fn hsubpd(ctx: &EmulationContext) -> Vector {
    horizontal::<f64>(ctx, f64::sse_sub)
}

/// Even lanes subtract, odd lanes add.
fn addsub<T: SseFloat>(ctx: &EmulationContext) -> Vector {
    let mut out = Vector::ZERO;
    for i in 0..ctx.lanes::<T>() {
        let d = ctx.dst.lane::<T>(i);
        let s = ctx.src.lane::<T>(i);
        out.set_lane(i, if i % 2 == 0 { d.sse_sub(s) } else { d.sse_add(s) });
    }
    out
}

pub fn addsubps(ctx: &EmulationContext) -> Vector {
    addsub::<f32>(ctx)
}

pub fn addsubpd(ctx: &EmulationContext) -> Vector {
    addsub::<f64>(ctx)
}

pub fn movddup(ctx: &EmulationContext) -> Vector {
    let q = ctx.src.lane::<u64>(0);
    Vector::from_lanes([q, q])
}

pub fn movsldup(ctx: &EmulationContext) -> Vector {
    let [s0, _, s2, _] = ctx.src.lanes::<u32, 4>();
    Vector::from_lanes([s0, s0, s2, s2])
}

pub fn movshdup(ctx: &EmulationContext) -> Vector {
    let [_, s1, _, s3] = ctx.src.lanes::<u32, 4>();
    Vector::from_lanes([s1, s1, s3, s3])
}

pub fn lddqu(ctx: &EmulationContext) -> Vector {
    ctx.src
}
