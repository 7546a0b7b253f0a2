//! 64-bit combiner id → canonical shader fingerprint + input mapping (C3).
//!
//! Grounded on the teacher's `gx/tev.rs` shape (small selector enums packed
//! into a per-stage config struct, normalized into a hashable fingerprint)
//! but the source alphabet is the RCP's two-cycle `(a-b)*c+d` combiner
//! rather than GX's 16-stage TEV array. `compile` never emits shader source
//! — that belongs to the backend (`RenderBackend::create_and_load_new_shader`)
//! — it only produces the `(shader_id0, shader_id1, input_mapping,
//! used_textures)` tuple the backend resolves a shader program from.

/// 64-bit combiner identifier: two 28-bit per-cycle records (`cycle0` in bits
/// `0..28`, `cycle1` in bits `28..56`) plus option bits in `56..64`.
pub type CombinerId = u64;

/// Option bits packed above bit 56 of a [`CombinerId`], refined by the
/// triangle assembler (§4.3 step 4) before lookup.
pub mod options {
    pub const ALPHA: u64 = 1 << 56;
    pub const FOG: u64 = 1 << 57;
    pub const TEXTURE_EDGE: u64 = 1 << 58;
    pub const NOISE: u64 = 1 << 59;
    pub const TWO_CYCLE: u64 = 1 << 60;
}

/// RGB combiner selector: `a`/`b` are 4-bit fields, `c` is a 5-bit field, `d`
/// is a 3-bit field, packed per cycle as `a | b<<4 | c<<8 | d<<13`.
/// Codes outside this alphabet canonicalize to [`RgbSelector::Zero`]
/// (§4.4 step 1; §7 "soft failures").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RgbSelector {
    Combined = 0,
    Texel0 = 1,
    Texel1 = 2,
    Prim = 3,
    Shade = 4,
    Env = 5,
    One = 6,
    Noise = 7,
    Zero = 8,
    CombinedAlpha = 9,
    Texel0Alpha = 10,
    Texel1Alpha = 11,
    PrimAlpha = 12,
    EnvAlpha = 13,
    LodFraction = 14,
    PrimLodFrac = 15,
}

impl RgbSelector {
    /// Accepts up to the widest (5-bit, the `c` field) selector encoding; the
    /// narrower `a`/`b`/`d` fields are already masked down by the caller.
    /// Codes outside the assigned alphabet (including every value with bit 4
    /// set, since no `c` selector exceeds 15) canonicalize to [`Self::Zero`].
    fn from_bits(v: u8) -> Self {
        match v {
            0 => Self::Combined,
            1 => Self::Texel0,
            2 => Self::Texel1,
            3 => Self::Prim,
            4 => Self::Shade,
            5 => Self::Env,
            6 => Self::One,
            7 => Self::Noise,
            9 => Self::CombinedAlpha,
            10 => Self::Texel0Alpha,
            11 => Self::Texel1Alpha,
            12 => Self::PrimAlpha,
            13 => Self::EnvAlpha,
            14 => Self::LodFraction,
            15 => Self::PrimLodFrac,
            _ => Self::Zero,
        }
    }

    fn bits(self) -> u8 {
        self as u8
    }

    fn is_texel(self) -> bool {
        matches!(
            self,
            Self::Texel0 | Self::Texel1 | Self::Texel0Alpha | Self::Texel1Alpha
        )
    }

    /// Whether this selector is one of the RGB-group "shader input" sources
    /// assigned an `input_mapping` slot (§4.4 step 3): everything that isn't
    /// a texel, the combined-stage feedback, or a hardware constant.
    fn is_shader_input(self) -> bool {
        matches!(
            self,
            Self::Prim
                | Self::PrimAlpha
                | Self::PrimLodFrac
                | Self::Shade
                | Self::Env
                | Self::EnvAlpha
                | Self::LodFraction
        )
    }
}

/// Alpha combiner selector (3-bit field). All 8 codes are assigned, so no
/// canonicalization is needed — kept as a documented invariant of the width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AlphaSelector {
    LodOrCombined = 0,
    Texel0 = 1,
    Texel1 = 2,
    Prim = 3,
    Shade = 4,
    Env = 5,
    PrimLodFrac = 6,
    Zero = 7,
}

impl AlphaSelector {
    fn from_bits(v: u8) -> Self {
        match v & 0x7 {
            0 => Self::LodOrCombined,
            1 => Self::Texel0,
            2 => Self::Texel1,
            3 => Self::Prim,
            4 => Self::Shade,
            5 => Self::Env,
            6 => Self::PrimLodFrac,
            _ => Self::Zero,
        }
    }

    fn bits(self) -> u8 {
        self as u8
    }

    fn is_texel(self) -> bool {
        matches!(self, Self::Texel0 | Self::Texel1)
    }

    fn is_shader_input(self) -> bool {
        matches!(
            self,
            Self::Prim | Self::Shade | Self::Env | Self::LodOrCombined | Self::PrimLodFrac
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Cycle {
    rgb: [RgbSelector; 4],
    alpha: [AlphaSelector; 4],
}

impl Cycle {
    fn decode(bits28: u32) -> Self {
        let rgb = [
            RgbSelector::from_bits((bits28 & 0xf) as u8),
            RgbSelector::from_bits(((bits28 >> 4) & 0xf) as u8),
            RgbSelector::from_bits(((bits28 >> 8) & 0x1f) as u8),
            RgbSelector::from_bits(((bits28 >> 13) & 0x7) as u8),
        ];
        let alpha = [
            AlphaSelector::from_bits(((bits28 >> 16) & 0x7) as u8),
            AlphaSelector::from_bits(((bits28 >> 19) & 0x7) as u8),
            AlphaSelector::from_bits(((bits28 >> 22) & 0x7) as u8),
            AlphaSelector::from_bits(((bits28 >> 25) & 0x7) as u8),
        ];
        Self { rgb, alpha }
    }

    fn encode(&self) -> u32 {
        let mut bits = 0u32;
        bits |= (self.rgb[0].bits() as u32 & 0xf) << 0;
        bits |= (self.rgb[1].bits() as u32 & 0xf) << 4;
        bits |= (self.rgb[2].bits() as u32 & 0x1f) << 8;
        bits |= (self.rgb[3].bits() as u32 & 0x7) << 13;
        for i in 0..4 {
            bits |= (self.alpha[i].bits() as u32 & 0x7) << (16 + i * 3);
        }
        bits
    }

    /// `(a-b)*c+d` degenerates to `d` when `a==b` or `c==0`; zero `a`, `b`,
    /// `c` in that case so the normalized form is shared by every formula
    /// that reduces to the same constant (§4.4 step 1, §8 determinism
    /// property).
    fn normalize(&mut self) {
        if self.rgb[0] == self.rgb[1] || self.rgb[2] == RgbSelector::Zero {
            self.rgb[0] = RgbSelector::Zero;
            self.rgb[1] = RgbSelector::Zero;
            self.rgb[2] = RgbSelector::Zero;
        }
        if self.alpha[0] == self.alpha[1] || self.alpha[2] == AlphaSelector::Zero {
            self.alpha[0] = AlphaSelector::Zero;
            self.alpha[1] = AlphaSelector::Zero;
            self.alpha[2] = AlphaSelector::Zero;
        }
    }

    fn zero_rgb(&mut self) {
        self.rgb = [RgbSelector::Zero; 4];
    }

    fn zero_alpha(&mut self) {
        self.alpha = [AlphaSelector::Zero; 4];
    }

    fn rgb_output_is_zero(&self) -> bool {
        self.rgb == [RgbSelector::Zero; 4]
    }

    fn alpha_output_is_zero(&self) -> bool {
        self.alpha == [AlphaSelector::Zero; 4]
    }
}

/// One assigned shader input: the group it was collected from (RGB-list or
/// alpha-list, §4.4 step 3) and which original selector it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Prim,
    PrimAlpha,
    PrimLodFrac,
    Shade,
    Env,
    EnvAlpha,
    LodFraction,
    LodOrCombined,
    Unused,
}

/// Collapsed texel reference: which of the (at most) two bound texture
/// units this selector samples, and whether it's the alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelRef {
    Texel0,
    Texel1,
    Texel0Alpha,
    Texel1Alpha,
    Combined,
}

#[derive(Debug, Clone)]
pub struct CompiledCombiner {
    pub cc_id: CombinerId,
    pub shader_id0: u64,
    pub shader_id1: u32,
    pub used_textures: [bool; 2],
    /// `[group][slot]`: group 0 is the RGB-list (§4.4 step 3's 7-entry
    /// alphabet), group 1 the alpha-list (5-entry alphabet). Unused trailing
    /// slots hold [`InputSource::Unused`].
    pub input_mapping: [[InputSource; 7]; 2],
}

fn assign_inputs(cycles: &[Cycle; 2]) -> [[InputSource; 7]; 2] {
    let mut mapping = [[InputSource::Unused; 7]; 2];

    let rgb_symbol = |s: RgbSelector| -> Option<InputSource> {
        match s {
            RgbSelector::Prim => Some(InputSource::Prim),
            RgbSelector::PrimAlpha => Some(InputSource::PrimAlpha),
            RgbSelector::PrimLodFrac => Some(InputSource::PrimLodFrac),
            RgbSelector::Shade => Some(InputSource::Shade),
            RgbSelector::Env => Some(InputSource::Env),
            RgbSelector::EnvAlpha => Some(InputSource::EnvAlpha),
            RgbSelector::LodFraction => Some(InputSource::LodFraction),
            _ => None,
        }
    };
    let alpha_symbol = |s: AlphaSelector| -> Option<InputSource> {
        match s {
            AlphaSelector::Prim => Some(InputSource::Prim),
            AlphaSelector::Shade => Some(InputSource::Shade),
            AlphaSelector::Env => Some(InputSource::Env),
            AlphaSelector::LodOrCombined => Some(InputSource::LodOrCombined),
            AlphaSelector::PrimLodFrac => Some(InputSource::PrimLodFrac),
            _ => None,
        }
    };

    let mut rgb_next = 0usize;
    for cyc in cycles {
        for sel in cyc.rgb {
            if !sel.is_shader_input() {
                continue;
            }
            if let Some(sym) = rgb_symbol(sel) {
                if rgb_next < 7 && !mapping[0][..rgb_next].contains(&sym) {
                    mapping[0][rgb_next] = sym;
                    rgb_next += 1;
                }
            }
        }
    }

    let mut alpha_next = 0usize;
    for cyc in cycles {
        for sel in cyc.alpha {
            if !sel.is_shader_input() {
                continue;
            }
            if let Some(sym) = alpha_symbol(sel) {
                if alpha_next < 7 && !mapping[1][..alpha_next].contains(&sym) {
                    mapping[1][alpha_next] = sym;
                    alpha_next += 1;
                }
            }
        }
    }

    mapping
}

fn collapse_texel(s: RgbSelector) -> RgbSelector {
    // Identity for RGB selectors: the variants already name the canonical
    // texel references (§4.4 step 4 is a no-op at the RGB-selector level;
    // it matters for `used_textures` derivation below).
    s
}

fn used_textures_for(cycles: &[Cycle; 2]) -> [bool; 2] {
    let mut used = [false; 2];
    for cyc in cycles {
        for s in cyc.rgb {
            match collapse_texel(s) {
                RgbSelector::Texel0 | RgbSelector::Texel0Alpha => used[0] = true,
                RgbSelector::Texel1 | RgbSelector::Texel1Alpha => used[1] = true,
                _ => {}
            }
        }
        for s in cyc.alpha {
            match s {
                AlphaSelector::Texel0 => used[0] = true,
                AlphaSelector::Texel1 => used[1] = true,
                _ => {}
            }
        }
    }
    used
}

/// A combiner id whose single cycle outputs `Shade` verbatim for both RGB
/// and alpha (`d = SHADE`, everything else zeroed). Used by the rectangle
/// primitive's FILL-mode override (§4.6), where the combiner is temporarily
/// replaced so the fill color — loaded into the synthetic corners' `Shade`
/// slot — becomes the rectangle's output color untouched.
pub fn shade_only_combiner_id() -> CombinerId {
    let cycle = Cycle {
        rgb: [RgbSelector::Zero, RgbSelector::Zero, RgbSelector::Zero, RgbSelector::Shade],
        alpha: [AlphaSelector::Zero, AlphaSelector::Zero, AlphaSelector::Zero, AlphaSelector::Shade],
    };
    cycle.encode() as u64
}

/// Compile a 64-bit combiner id into its canonical shader fingerprint and
/// input layout. Deterministic and pure: `compile(cc).shader_id0` depends
/// only on the normalized form (§8).
pub fn compile(cc_id: CombinerId) -> CompiledCombiner {
    let opt_bits = cc_id & 0xff00_0000_0000_0000;
    let two_cycle = opt_bits & options::TWO_CYCLE != 0;

    let mut cycles = [
        Cycle::decode((cc_id & 0x0fff_ffff) as u32),
        Cycle::decode(((cc_id >> 28) & 0x0fff_ffff) as u32),
    ];
    cycles[0].normalize();
    cycles[1].normalize();

    if !two_cycle {
        cycles[1].zero_rgb();
        cycles[1].zero_alpha();
    } else {
        // If the second cycle never reads the first cycle's output, the
        // first cycle's result is dead and normalizes to zero too.
        if !cycles[1].rgb.contains(&RgbSelector::Combined) && !cycles[0].rgb_output_is_zero() {
            cycles[0].zero_rgb();
        }
        if !cycles[1].alpha.contains(&AlphaSelector::LodOrCombined) && !cycles[0].alpha_output_is_zero() {
            cycles[0].zero_alpha();
        }
    }

    let input_mapping = assign_inputs(&cycles);
    let used_textures = used_textures_for(&cycles);

    let shader_id0 = (cycles[0].encode() as u64) | ((cycles[1].encode() as u64) << 28);
    let shader_id1 = (opt_bits >> 56) as u32;

    CompiledCombiner {
        cc_id,
        shader_id0,
        shader_id1,
        used_textures,
        input_mapping,
    }
}
