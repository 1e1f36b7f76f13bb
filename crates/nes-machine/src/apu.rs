//! APU: two square channels, triangle, noise and DMC, mixed to stereo.
//!
//! Channel timers are clocked in CPU cycles; the frame sequencer runs at
//! 240Hz off a master counter kept at double CPU speed. Channel output
//! is accumulated between host samples and averaged, then run through a
//! non-linear DAC table and a DC-blocking filter per stereo side.

use nes_core::Irq;

use crate::bus::Signals;

const CPU_FREQ_NTSC: f64 = 1_789_772.5;

/// Mixed samples stop accumulating past this point when the host never
/// drains them (about 1.5 seconds of stereo audio at 44.1kHz).
const MAX_BUFFERED_SAMPLES: usize = 65536;

const LENGTH_LOOKUP: [i32; 32] = [
    0x0A, 0xFE, 0x14, 0x02, 0x28, 0x04, 0x50, 0x06, 0xA0, 0x08, 0x3C, 0x0A, 0x0E, 0x0C, 0x1A,
    0x0E, 0x0C, 0x10, 0x18, 0x12, 0x30, 0x14, 0x60, 0x16, 0xC0, 0x18, 0x48, 0x1A, 0x10, 0x1C,
    0x20, 0x1E,
];

const DMC_FREQ_LOOKUP: [i32; 16] = [
    0xd60, 0xbe0, 0xaa0, 0xa00, 0x8f0, 0x7f0, 0x710, 0x6b0, 0x5f0, 0x500, 0x470, 0x400, 0x350,
    0x2a0, 0x240, 0x1b0,
];

const NOISE_WAVELENGTH_LOOKUP: [i32; 16] = [
    0x004, 0x008, 0x010, 0x020, 0x040, 0x060, 0x080, 0x0a0, 0x0ca, 0x0fe, 0x17c, 0x1fc, 0x2fa,
    0x3f8, 0x7f2, 0xfe4,
];

const DUTY_LOOKUP: [i32; 32] = [
    0, 1, 0, 0, 0, 0, 0, 0, // 12.5%
    0, 1, 1, 0, 0, 0, 0, 0, // 25%
    0, 1, 1, 1, 1, 0, 0, 0, // 50%
    1, 0, 0, 1, 1, 1, 1, 1, // 25% negated
];

fn get_length_max(value: u8) -> i32 {
    LENGTH_LOOKUP[usize::from(value >> 3)]
}

#[derive(Debug, Clone)]
struct Square {
    sqr1: bool,
    is_enabled: bool,
    length_counter_enable: bool,
    sweep_active: bool,
    env_decay_disable: bool,
    env_decay_loop_enable: bool,
    env_reset: bool,
    sweep_carry: bool,
    update_sweep_period: bool,
    prog_timer_count: i32,
    prog_timer_max: i32,
    length_counter: i32,
    square_counter: i32,
    sweep_counter: i32,
    sweep_counter_max: i32,
    sweep_mode: i32,
    sweep_shift_amount: i32,
    env_decay_rate: i32,
    env_decay_counter: i32,
    env_volume: i32,
    master_volume: i32,
    duty_mode: i32,
    sample_value: i32,
}

impl Square {
    fn new(sqr1: bool) -> Self {
        Self {
            sqr1,
            is_enabled: false,
            length_counter_enable: false,
            sweep_active: false,
            env_decay_disable: false,
            env_decay_loop_enable: false,
            env_reset: false,
            sweep_carry: false,
            update_sweep_period: false,
            prog_timer_count: 0,
            prog_timer_max: 0,
            length_counter: 0,
            square_counter: 0,
            sweep_counter: 0,
            sweep_counter_max: 0,
            sweep_mode: 0,
            sweep_shift_amount: 0,
            env_decay_rate: 0,
            env_decay_counter: 0,
            env_volume: 0,
            master_volume: 0,
            duty_mode: 0,
            sample_value: 0,
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.sqr1);
    }

    fn clock_length_counter(&mut self) {
        if self.length_counter_enable && self.length_counter > 0 {
            self.length_counter -= 1;
            if self.length_counter == 0 {
                self.update_sample_value();
            }
        }
    }

    fn clock_env_decay(&mut self) {
        if self.env_reset {
            self.env_reset = false;
            self.env_decay_counter = self.env_decay_rate + 1;
            self.env_volume = 0xf;
        } else {
            self.env_decay_counter -= 1;
            if self.env_decay_counter <= 0 {
                self.env_decay_counter = self.env_decay_rate + 1;
                if self.env_volume > 0 {
                    self.env_volume -= 1;
                } else {
                    self.env_volume = if self.env_decay_loop_enable { 0xf } else { 0 };
                }
            }
        }

        self.master_volume = if self.env_decay_disable {
            self.env_decay_rate
        } else {
            self.env_volume
        };
        self.update_sample_value();
    }

    fn clock_sweep(&mut self) {
        self.sweep_counter -= 1;
        if self.sweep_counter <= 0 {
            self.sweep_counter = self.sweep_counter_max + 1;
            if self.sweep_active && self.sweep_shift_amount > 0 && self.prog_timer_max > 7 {
                self.sweep_carry = false;
                if self.sweep_mode == 0 {
                    self.prog_timer_max += self.prog_timer_max >> self.sweep_shift_amount;
                    if self.prog_timer_max > 4095 {
                        self.prog_timer_max = 4095;
                        self.sweep_carry = true;
                    }
                } else {
                    // The first square channel's adder carries in a one.
                    self.prog_timer_max -= (self.prog_timer_max >> self.sweep_shift_amount)
                        - i32::from(self.sqr1);
                }
            }
        }

        if self.update_sweep_period {
            self.update_sweep_period = false;
            self.sweep_counter = self.sweep_counter_max + 1;
        }
    }

    fn update_sample_value(&mut self) {
        if self.is_enabled && self.length_counter > 0 && self.prog_timer_max > 7 {
            if self.sweep_mode == 0
                && self.prog_timer_max + (self.prog_timer_max >> self.sweep_shift_amount) > 4095
            {
                self.sample_value = 0;
            } else {
                self.sample_value = self.master_volume
                    * DUTY_LOOKUP[((self.duty_mode << 3) + self.square_counter) as usize];
            }
        } else {
            self.sample_value = 0;
        }
    }

    fn write_reg(&mut self, address: u16, value: u8) {
        let addr_add = if self.sqr1 { 0 } else { 4 };
        if address == 0x4000 + addr_add {
            // Volume/envelope decay:
            self.env_decay_disable = value & 0x10 != 0;
            self.env_decay_rate = i32::from(value & 0xf);
            self.env_decay_loop_enable = value & 0x20 != 0;
            self.duty_mode = i32::from((value >> 6) & 0x3);
            self.length_counter_enable = value & 0x20 == 0;
            self.master_volume = if self.env_decay_disable {
                self.env_decay_rate
            } else {
                self.env_volume
            };
            self.update_sample_value();
        } else if address == 0x4001 + addr_add {
            // Sweep:
            self.sweep_active = value & 0x80 != 0;
            self.sweep_counter_max = i32::from((value >> 4) & 7);
            self.sweep_mode = i32::from((value >> 3) & 1);
            self.sweep_shift_amount = i32::from(value & 7);
            self.update_sweep_period = true;
        } else if address == 0x4002 + addr_add {
            // Programmable timer:
            self.prog_timer_max &= 0x700;
            self.prog_timer_max |= i32::from(value);
        } else if address == 0x4003 + addr_add {
            // Programmable timer, length counter:
            self.prog_timer_max &= 0xff;
            self.prog_timer_max |= i32::from(value & 0x7) << 8;

            if self.is_enabled {
                self.length_counter = get_length_max(value & 0xf8);
            }
            self.env_reset = true;
        }
    }

    fn set_enabled(&mut self, value: bool) {
        self.is_enabled = value;
        if !value {
            self.length_counter = 0;
        }
        self.update_sample_value();
    }

    fn get_length_status(&self) -> u8 {
        u8::from(self.length_counter != 0 && self.is_enabled)
    }
}

#[derive(Debug, Clone)]
struct Triangle {
    is_enabled: bool,
    sample_condition: bool,
    length_counter_enable: bool,
    lc_halt: bool,
    lc_control: bool,
    prog_timer_count: i32,
    prog_timer_max: i32,
    triangle_counter: i32,
    length_counter: i32,
    linear_counter: i32,
    lc_load_value: i32,
    sample_value: i32,
}

impl Triangle {
    fn new() -> Self {
        Self {
            is_enabled: false,
            sample_condition: false,
            length_counter_enable: false,
            lc_halt: true,
            lc_control: false,
            prog_timer_count: 0,
            prog_timer_max: 0,
            triangle_counter: 0,
            length_counter: 0,
            linear_counter: 0,
            lc_load_value: 0,
            sample_value: 0xf,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn clock_length_counter(&mut self) {
        if self.length_counter_enable && self.length_counter > 0 {
            self.length_counter -= 1;
            if self.length_counter == 0 {
                self.update_sample_condition();
            }
        }
    }

    fn clock_linear_counter(&mut self) {
        if self.lc_halt {
            self.linear_counter = self.lc_load_value;
            self.update_sample_condition();
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
            self.update_sample_condition();
        }
        if !self.lc_control {
            self.lc_halt = false;
        }
    }

    fn write_reg(&mut self, address: u16, value: u8) {
        if address == 0x4008 {
            // Linear counter load and control:
            self.lc_control = value & 0x80 != 0;
            self.lc_load_value = i32::from(value & 0x7f);
            self.length_counter_enable = !self.lc_control;
        } else if address == 0x400a {
            self.prog_timer_max &= 0x700;
            self.prog_timer_max |= i32::from(value);
        } else if address == 0x400b {
            self.prog_timer_max &= 0xff;
            self.prog_timer_max |= i32::from(value & 0x07) << 8;
            self.length_counter = get_length_max(value & 0xf8);
            self.lc_halt = true;
        }

        self.update_sample_condition();
    }

    fn set_enabled(&mut self, value: bool) {
        self.is_enabled = value;
        if !value {
            self.length_counter = 0;
        }
        self.update_sample_condition();
    }

    fn update_sample_condition(&mut self) {
        self.sample_condition = self.is_enabled
            && self.prog_timer_max > 7
            && self.linear_counter > 0
            && self.length_counter > 0;
    }

    /// Interpolate the triangle between timer steps.
    fn acc_sample(&self, tri_value: i32) -> i32 {
        if !self.sample_condition {
            return tri_value;
        }

        let mut value = (self.prog_timer_count << 4) / (self.prog_timer_max + 1);
        if value > 16 {
            value = 16;
        }
        if self.triangle_counter >= 16 {
            value = 16 - value;
        }
        value + self.sample_value
    }

    fn get_length_status(&self) -> u8 {
        u8::from(self.length_counter != 0 && self.is_enabled)
    }
}

#[derive(Debug, Clone)]
struct Noise {
    is_enabled: bool,
    env_decay_disable: bool,
    env_decay_loop_enable: bool,
    length_counter_enable: bool,
    env_reset: bool,
    length_counter: i32,
    prog_timer_count: i32,
    prog_timer_max: i32,
    env_decay_rate: i32,
    env_decay_counter: i32,
    env_volume: i32,
    master_volume: i32,
    shift_reg: i32,
    random_bit: i32,
    random_mode: i32,
    sample_value: i32,
    acc_value: i32,
    acc_count: i32,
}

impl Noise {
    fn new() -> Self {
        Self {
            is_enabled: false,
            env_decay_disable: false,
            env_decay_loop_enable: false,
            length_counter_enable: false,
            env_reset: false,
            length_counter: 0,
            prog_timer_count: 0,
            prog_timer_max: 0,
            env_decay_rate: 0,
            env_decay_counter: 0,
            env_volume: 0,
            master_volume: 0,
            shift_reg: 1 << 14,
            random_bit: 0,
            random_mode: 0,
            sample_value: 0,
            acc_value: 0,
            acc_count: 1,
        }
    }

    fn reset(&mut self) {
        let (acc_value, acc_count) = (self.acc_value, self.acc_count);
        *self = Self::new();
        self.shift_reg = 1;
        self.acc_value = acc_value;
        self.acc_count = acc_count;
    }

    fn clock_length_counter(&mut self) {
        if self.length_counter_enable && self.length_counter > 0 {
            self.length_counter -= 1;
            if self.length_counter == 0 {
                self.update_sample_value();
            }
        }
    }

    fn clock_env_decay(&mut self) {
        if self.env_reset {
            self.env_reset = false;
            self.env_decay_counter = self.env_decay_rate + 1;
            self.env_volume = 0xf;
        } else {
            self.env_decay_counter -= 1;
            if self.env_decay_counter <= 0 {
                self.env_decay_counter = self.env_decay_rate + 1;
                if self.env_volume > 0 {
                    self.env_volume -= 1;
                } else {
                    self.env_volume = if self.env_decay_loop_enable { 0xf } else { 0 };
                }
            }
        }

        self.master_volume = if self.env_decay_disable {
            self.env_decay_rate
        } else {
            self.env_volume
        };
        self.update_sample_value();
    }

    fn update_sample_value(&mut self) {
        if self.is_enabled && self.length_counter > 0 {
            self.sample_value = self.random_bit * self.master_volume;
        }
    }

    fn write_reg(&mut self, address: u16, value: u8) {
        if address == 0x400c {
            // Volume/envelope decay:
            self.env_decay_disable = value & 0x10 != 0;
            self.env_decay_rate = i32::from(value & 0xf);
            self.env_decay_loop_enable = value & 0x20 != 0;
            self.length_counter_enable = value & 0x20 == 0;
            self.master_volume = if self.env_decay_disable {
                self.env_decay_rate
            } else {
                self.env_volume
            };
        } else if address == 0x400e {
            // Programmable timer:
            self.prog_timer_max = NOISE_WAVELENGTH_LOOKUP[usize::from(value & 0xf)];
            self.random_mode = i32::from(value >> 7);
        } else if address == 0x400f {
            // Length counter:
            self.length_counter = get_length_max(value & 0xf8);
            self.env_reset = true;
        }
    }

    fn set_enabled(&mut self, value: bool) {
        self.is_enabled = value;
        if !value {
            self.length_counter = 0;
        }
        self.update_sample_value();
    }

    /// Drain the accumulated output as a 4.4 fixed point average.
    fn acc(&mut self) -> i32 {
        if self.acc_count > 0 {
            let smp = (self.acc_value << 4) / self.acc_count;
            self.acc_value = smp >> 4;
            self.acc_count = 1;
            smp
        } else {
            self.sample_value << 4
        }
    }

    fn get_length_status(&self) -> u8 {
        u8::from(self.length_counter != 0 && self.is_enabled)
    }
}

const MODE_NORMAL: i32 = 0;
const MODE_LOOP: i32 = 1;
const MODE_IRQ: i32 = 2;

#[derive(Debug, Clone)]
struct Dmc {
    is_enabled: bool,
    has_sample: bool,
    irq_generated: bool,
    play_mode: i32,
    dma_frequency: i32,
    dma_counter: i32,
    delta_counter: i32,
    play_start_address: i32,
    play_address: i32,
    play_length: i32,
    play_length_counter: i32,
    shift_counter: i32,
    sample: i32,
    dac_lsb: i32,
    data: i32,
}

impl Dmc {
    fn new() -> Self {
        Self {
            is_enabled: false,
            has_sample: false,
            irq_generated: false,
            play_mode: MODE_NORMAL,
            dma_frequency: 0,
            dma_counter: 0,
            delta_counter: 0,
            play_start_address: 0,
            play_address: 0,
            play_length: 0,
            play_length_counter: 0,
            shift_counter: 0,
            sample: 0,
            dac_lsb: 0,
            data: 0,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn clock_dmc(&mut self, mem: &[u8], signals: &mut Signals) {
        // Only alter the DAC when the sample buffer holds data:
        if self.has_sample {
            if self.data & 1 == 0 {
                if self.delta_counter > 0 {
                    self.delta_counter -= 1;
                }
            } else if self.delta_counter < 63 {
                self.delta_counter += 1;
            }

            self.sample = if self.is_enabled {
                (self.delta_counter << 1) + self.dac_lsb
            } else {
                0
            };

            self.data >>= 1;
        }

        self.dma_counter -= 1;
        if self.dma_counter <= 0 {
            self.has_sample = false;
            self.end_of_sample(mem, signals);
            self.dma_counter = 8;
        }

        if self.irq_generated {
            signals.request_irq(Irq::Normal);
        }
    }

    fn end_of_sample(&mut self, mem: &[u8], signals: &mut Signals) {
        if self.play_length_counter == 0 && self.play_mode == MODE_LOOP {
            // Start over from the beginning of the sample:
            self.play_address = self.play_start_address;
            self.play_length_counter = self.play_length;
        }

        if self.play_length_counter > 0 {
            self.next_sample(mem, signals);

            if self.play_length_counter == 0 && self.play_mode == MODE_IRQ {
                self.irq_generated = true;
            }
        }
    }

    fn next_sample(&mut self, mem: &[u8], signals: &mut Signals) {
        // The DMA fetch steals CPU cycles.
        self.data = i32::from(mem[self.play_address as usize & 0xffff]);
        signals.halt_cycles(4);

        self.play_length_counter -= 1;
        self.play_address += 1;
        if self.play_address > 0xffff {
            self.play_address = 0x8000;
        }

        self.has_sample = true;
    }

    fn write_reg(&mut self, address: u16, value: u8) {
        if address == 0x4010 {
            // Play mode, DMA frequency:
            if value >> 6 == 0 {
                self.play_mode = MODE_NORMAL;
            } else if (value >> 6) & 1 == 1 {
                self.play_mode = MODE_LOOP;
            } else if value >> 6 == 2 {
                self.play_mode = MODE_IRQ;
            }

            if value & 0x80 == 0 {
                self.irq_generated = false;
            }

            self.dma_frequency = DMC_FREQ_LOOKUP[usize::from(value & 0xf)];
        } else if address == 0x4011 {
            // Delta counter load:
            self.delta_counter = i32::from((value >> 1) & 63);
            self.dac_lsb = i32::from(value & 1);
            self.sample = (self.delta_counter << 1) + self.dac_lsb;
        } else if address == 0x4012 {
            // Play address load:
            self.play_start_address = (i32::from(value) << 6) | 0xc000;
            self.play_address = self.play_start_address;
        } else if address == 0x4013 {
            // Play length:
            self.play_length = (i32::from(value) << 4) + 1;
            self.play_length_counter = self.play_length;
        } else if address == 0x4015 {
            // DMC/IRQ status:
            if (value >> 4) & 1 == 0 {
                self.play_length_counter = 0;
            } else {
                self.play_address = self.play_start_address;
                self.play_length_counter = self.play_length;
            }
            self.irq_generated = false;
        }
    }

    fn set_enabled(&mut self, value: bool) {
        if !self.is_enabled && value {
            self.play_length_counter = self.play_length;
        }
        self.is_enabled = value;
    }

    fn get_length_status(&self) -> u8 {
        u8::from(self.play_length_counter != 0 && self.is_enabled)
    }

    fn get_irq_status(&self) -> u8 {
        u8::from(self.irq_generated)
    }
}

/// The audio processing unit.
pub struct Apu {
    square1: Square,
    square2: Square,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,

    frame_irq_counter_max: i32,
    init_counter: i32,
    channel_enable_value: u8,
    frame_irq_enabled: bool,
    frame_irq_active: bool,
    initing_hardware: bool,

    master_frame_counter: i32,
    derived_frame_counter: i32,
    count_sequence: i32,
    sample_timer: i32,
    frame_time: i32,
    sample_timer_max: i32,
    tri_value: i32,

    smp_square1: i32,
    smp_square2: i32,
    smp_triangle: i32,
    smp_dmc: i32,
    acc_count: i32,

    // DC removal:
    prev_sample_l: i32,
    prev_sample_r: i32,
    smp_accum_l: i32,
    smp_accum_r: i32,

    dc_value: i32,
    master_volume: i32,
    panning: [i32; 5],
    stereo_pos_l: [i32; 5],
    stereo_pos_r: [i32; 5],
    extra_cycles: i32,

    square_table: Vec<i32>,
    tnd_table: Vec<i32>,

    sample_rate: f64,
    frame_rate: f64,

    /// Mixed stereo samples (-1.0..1.0) produced since the last drain.
    pub samples: Vec<(f32, f32)>,
}

impl Apu {
    #[must_use]
    pub fn new(sample_rate: f64, frame_rate: f64) -> Self {
        let mut apu = Self {
            square1: Square::new(true),
            square2: Square::new(false),
            triangle: Triangle::new(),
            noise: Noise::new(),
            dmc: Dmc::new(),
            frame_irq_counter_max: 4,
            init_counter: 2048,
            channel_enable_value: 0,
            frame_irq_enabled: false,
            frame_irq_active: false,
            initing_hardware: false,
            master_frame_counter: 0,
            derived_frame_counter: 0,
            count_sequence: 0,
            sample_timer: 0,
            frame_time: 0,
            sample_timer_max: 0,
            tri_value: 0,
            smp_square1: 0,
            smp_square2: 0,
            smp_triangle: 0,
            smp_dmc: 0,
            acc_count: 0,
            prev_sample_l: 0,
            prev_sample_r: 0,
            smp_accum_l: 0,
            smp_accum_r: 0,
            dc_value: 0,
            master_volume: 256,
            panning: [80, 170, 100, 150, 128],
            stereo_pos_l: [0; 5],
            stereo_pos_r: [0; 5],
            extra_cycles: 0,
            square_table: Vec::new(),
            tnd_table: Vec::new(),
            sample_rate,
            frame_rate,
            samples: Vec::new(),
        };

        apu.update_stereo_pos();
        apu.init_dac_tables();

        // Power-on register state:
        for i in 0..0x14u16 {
            if i == 0x10 {
                apu.write_reg(0x4010, 0x10);
            } else {
                apu.write_reg(0x4000 + i, 0);
            }
        }

        apu.reset();
        apu
    }

    pub fn reset(&mut self) {
        self.sample_timer_max =
            ((1024.0 * CPU_FREQ_NTSC * self.frame_rate) / (self.sample_rate * 60.0)).floor() as i32;
        self.frame_time = ((14915.0 * self.frame_rate) / 60.0).floor() as i32;

        self.sample_timer = 0;

        self.update_channel_enable(0);
        self.master_frame_counter = 0;
        self.derived_frame_counter = 0;
        self.count_sequence = 0;
        self.init_counter = 2048;
        self.frame_irq_enabled = false;
        self.frame_irq_active = false;
        self.initing_hardware = false;
        self.extra_cycles = 0;

        self.reset_counter();

        self.square1.reset();
        self.square2.reset();
        self.triangle.reset();
        self.noise.reset();
        self.dmc.reset();

        self.acc_count = 0;
        self.smp_square1 = 0;
        self.smp_square2 = 0;
        self.smp_triangle = 0;
        self.smp_dmc = 0;
        self.tri_value = 0;

        self.frame_irq_counter_max = 4;
        self.channel_enable_value = 0xff;

        self.prev_sample_l = 0;
        self.prev_sample_r = 0;
        self.smp_accum_l = 0;
        self.smp_accum_r = 0;
    }

    /// Read $4015: channel length statuses plus IRQ flags. Reading
    /// acknowledges both the frame IRQ and the DMC IRQ.
    pub fn read_status(&mut self) -> u8 {
        let mut tmp = 0;
        tmp |= self.square1.get_length_status();
        tmp |= self.square2.get_length_status() << 1;
        tmp |= self.triangle.get_length_status() << 2;
        tmp |= self.noise.get_length_status() << 3;
        tmp |= self.dmc.get_length_status() << 4;
        tmp |= u8::from(self.frame_irq_active && self.frame_irq_enabled) << 6;
        tmp |= self.dmc.get_irq_status() << 7;

        self.frame_irq_active = false;
        self.dmc.irq_generated = false;

        tmp
    }

    pub fn write_reg(&mut self, address: u16, value: u8) {
        match address {
            0x4000..=0x4003 => self.square1.write_reg(address, value),
            0x4004..=0x4007 => self.square2.write_reg(address, value),
            0x4008..=0x400b => self.triangle.write_reg(address, value),
            0x400c..=0x400f => self.noise.write_reg(address, value),
            0x4010..=0x4013 => self.dmc.write_reg(address, value),
            0x4015 => {
                // Channel enable:
                self.update_channel_enable(value);

                if value != 0 && self.init_counter > 0 {
                    // Start hardware initialization:
                    self.initing_hardware = true;
                }

                self.dmc.write_reg(address, value);
            }
            0x4017 => {
                // Frame counter control:
                self.count_sequence = i32::from((value >> 7) & 1);
                self.master_frame_counter = 0;
                self.frame_irq_active = false;
                self.frame_irq_enabled = (value >> 6) & 0x1 == 0;

                if self.count_sequence == 0 {
                    self.frame_irq_counter_max = 4;
                    self.derived_frame_counter = 4;
                } else {
                    self.frame_irq_counter_max = 5;
                    self.derived_frame_counter = 0;
                    self.frame_counter_tick();
                }
            }
            _ => {}
        }
    }

    fn reset_counter(&mut self) {
        self.derived_frame_counter = if self.count_sequence == 0 { 4 } else { 0 };
    }

    fn update_channel_enable(&mut self, value: u8) {
        self.channel_enable_value = value;
        self.square1.set_enabled(value & 1 != 0);
        self.square2.set_enabled(value & 2 != 0);
        self.triangle.set_enabled(value & 4 != 0);
        self.noise.set_enabled(value & 8 != 0);
        self.dmc.set_enabled(value & 16 != 0);
    }

    /// Run the channels and the frame sequencer for `n_cycles` CPU
    /// cycles. DMC sample fetches read through `mem` (the fetch window
    /// lives entirely in the ROM area).
    pub fn clock_frame_counter(&mut self, n_cycles: i32, mem: &[u8], signals: &mut Signals) {
        if self.init_counter > 0 && self.initing_hardware {
            self.init_counter -= n_cycles;
            if self.init_counter <= 0 {
                self.initing_hardware = false;
            }
            return;
        }

        // Don't process ticks beyond the next sampling point:
        let mut n_cycles = n_cycles + self.extra_cycles;
        let max_cycles = self.sample_timer_max - self.sample_timer;
        if (n_cycles << 10) > max_cycles {
            self.extra_cycles = ((n_cycles << 10) - max_cycles) >> 10;
            n_cycles -= self.extra_cycles;
        } else {
            self.extra_cycles = 0;
        }

        // Clock DMC:
        if self.dmc.is_enabled {
            self.dmc.shift_counter -= n_cycles << 3;
            while self.dmc.shift_counter <= 0 && self.dmc.dma_frequency > 0 {
                self.dmc.shift_counter += self.dmc.dma_frequency;
                self.dmc.clock_dmc(mem, signals);
            }
        }

        // Clock the triangle timer:
        if self.triangle.prog_timer_max > 0 {
            self.triangle.prog_timer_count -= n_cycles;
            while self.triangle.prog_timer_count <= 0 {
                self.triangle.prog_timer_count += self.triangle.prog_timer_max + 1;
                if self.triangle.linear_counter > 0 && self.triangle.length_counter > 0 {
                    self.triangle.triangle_counter += 1;
                    self.triangle.triangle_counter &= 0x1f;

                    if self.triangle.is_enabled {
                        if self.triangle.triangle_counter >= 0x10 {
                            self.triangle.sample_value = self.triangle.triangle_counter & 0xf;
                        } else {
                            // Inverted half of the wave:
                            self.triangle.sample_value =
                                0xf - (self.triangle.triangle_counter & 0xf);
                        }
                        self.triangle.sample_value <<= 4;
                    }
                }
            }
        }

        // Clock the square timers:
        self.square1.prog_timer_count -= n_cycles;
        if self.square1.prog_timer_count <= 0 {
            self.square1.prog_timer_count += (self.square1.prog_timer_max + 1) << 1;
            self.square1.square_counter = (self.square1.square_counter + 1) & 0x7;
            self.square1.update_sample_value();
        }

        self.square2.prog_timer_count -= n_cycles;
        if self.square2.prog_timer_count <= 0 {
            self.square2.prog_timer_count += (self.square2.prog_timer_max + 1) << 1;
            self.square2.square_counter = (self.square2.square_counter + 1) & 0x7;
            self.square2.update_sample_value();
        }

        // Clock the noise timer:
        let mut acc_c = n_cycles;
        if self.noise.prog_timer_count - acc_c > 0 {
            // Do all cycles at once:
            self.noise.prog_timer_count -= acc_c;
            self.noise.acc_count += acc_c;
            self.noise.acc_value += acc_c * self.noise.sample_value;
        } else {
            // Slow-step:
            while acc_c > 0 {
                acc_c -= 1;
                self.noise.prog_timer_count -= 1;
                if self.noise.prog_timer_count <= 0 && self.noise.prog_timer_max > 0 {
                    // Update the shift register:
                    self.noise.shift_reg <<= 1;
                    let shift = if self.noise.random_mode == 0 { 1 } else { 6 };
                    let tmp =
                        ((self.noise.shift_reg << shift) ^ self.noise.shift_reg) & 0x8000;
                    if tmp != 0 {
                        self.noise.shift_reg |= 0x01;
                        self.noise.random_bit = 0;
                        self.noise.sample_value = 0;
                    } else {
                        self.noise.random_bit = 1;
                        if self.noise.is_enabled && self.noise.length_counter > 0 {
                            self.noise.sample_value = self.noise.master_volume;
                        } else {
                            self.noise.sample_value = 0;
                        }
                    }

                    self.noise.prog_timer_count += self.noise.prog_timer_max;
                }

                self.noise.acc_value += self.noise.sample_value;
                self.noise.acc_count += 1;
            }
        }

        // Frame IRQ handling:
        if self.frame_irq_enabled && self.frame_irq_active {
            signals.request_irq(Irq::Normal);
        }

        // The frame counter runs at double CPU speed:
        self.master_frame_counter += n_cycles << 1;
        if self.master_frame_counter >= self.frame_time {
            // 240Hz tick:
            self.master_frame_counter -= self.frame_time;
            self.frame_counter_tick();
        }

        self.acc_sample(n_cycles);

        // Clock the sample timer:
        self.sample_timer += n_cycles << 10;
        if self.sample_timer >= self.sample_timer_max {
            self.sample();
            self.sample_timer -= self.sample_timer_max;
        }
    }

    fn acc_sample(&mut self, cycles: i32) {
        // The triangle needs interpolation between timer steps.
        self.tri_value = self.triangle.acc_sample(self.tri_value);

        self.smp_triangle += cycles * self.tri_value;
        self.smp_dmc += cycles * self.dmc.sample;
        self.smp_square1 += cycles * self.square1.sample_value;
        self.smp_square2 += cycles * self.square2.sample_value;
        self.acc_count += cycles;
    }

    fn frame_counter_tick(&mut self) {
        self.derived_frame_counter += 1;
        if self.derived_frame_counter >= self.frame_irq_counter_max {
            self.derived_frame_counter = 0;
        }

        if self.derived_frame_counter == 1 || self.derived_frame_counter == 3 {
            // Clock length counters and sweep units:
            self.triangle.clock_length_counter();
            self.square1.clock_length_counter();
            self.square2.clock_length_counter();
            self.noise.clock_length_counter();
            self.square1.clock_sweep();
            self.square2.clock_sweep();
        }

        if (0..4).contains(&self.derived_frame_counter) {
            // Clock envelopes and the linear counter:
            self.square1.clock_env_decay();
            self.square2.clock_env_decay();
            self.noise.clock_env_decay();
            self.triangle.clock_linear_counter();
        }

        if self.derived_frame_counter == 3 && self.count_sequence == 0 {
            self.frame_irq_active = true;
        }
    }

    /// Average the accumulated channel output, mix both stereo sides
    /// and push one host sample.
    fn sample(&mut self) {
        if self.acc_count > 0 {
            self.smp_square1 = (self.smp_square1 << 4) / self.acc_count;
            self.smp_square2 = (self.smp_square2 << 4) / self.acc_count;
            self.smp_triangle /= self.acc_count;
            self.smp_dmc = (self.smp_dmc << 4) / self.acc_count;
            self.acc_count = 0;
        } else {
            self.smp_square1 = self.square1.sample_value << 4;
            self.smp_square2 = self.square2.sample_value << 4;
            self.smp_triangle = self.triangle.sample_value;
            self.smp_dmc = self.dmc.sample << 4;
        }

        let smp_noise = self.noise.acc();

        // Left channel:
        let sq_index = ((self.smp_square1 * self.stereo_pos_l[0]
            + self.smp_square2 * self.stereo_pos_l[1])
            >> 8)
            .min(self.square_table.len() as i32 - 1);
        let tnd_index = ((3 * self.smp_triangle * self.stereo_pos_l[2]
            + (smp_noise << 1) * self.stereo_pos_l[3]
            + self.smp_dmc * self.stereo_pos_l[4])
            >> 8)
            .min(self.tnd_table.len() as i32 - 1);
        let mut sample_value_l =
            self.square_table[sq_index as usize] + self.tnd_table[tnd_index as usize]
                - self.dc_value;

        // Right channel:
        let sq_index = ((self.smp_square1 * self.stereo_pos_r[0]
            + self.smp_square2 * self.stereo_pos_r[1])
            >> 8)
            .min(self.square_table.len() as i32 - 1);
        let tnd_index = ((3 * self.smp_triangle * self.stereo_pos_r[2]
            + (smp_noise << 1) * self.stereo_pos_r[3]
            + self.smp_dmc * self.stereo_pos_r[4])
            >> 8)
            .min(self.tnd_table.len() as i32 - 1);
        let mut sample_value_r =
            self.square_table[sq_index as usize] + self.tnd_table[tnd_index as usize]
                - self.dc_value;

        // Remove DC from the left channel:
        let smp_diff_l = sample_value_l - self.prev_sample_l;
        self.prev_sample_l += smp_diff_l;
        self.smp_accum_l += smp_diff_l - (self.smp_accum_l >> 10);
        sample_value_l = self.smp_accum_l;

        // Remove DC from the right channel:
        let smp_diff_r = sample_value_r - self.prev_sample_r;
        self.prev_sample_r += smp_diff_r;
        self.smp_accum_r += smp_diff_r - (self.smp_accum_r >> 10);
        sample_value_r = self.smp_accum_r;

        if self.samples.len() < MAX_BUFFERED_SAMPLES {
            self.samples.push((
                sample_value_l as f32 / 32768.0,
                sample_value_r as f32 / 32768.0,
            ));
        }

        self.smp_square1 = 0;
        self.smp_square2 = 0;
        self.smp_triangle = 0;
        self.smp_dmc = 0;
    }

    fn update_stereo_pos(&mut self) {
        for i in 0..5 {
            self.stereo_pos_l[i] = (self.panning[i] * self.master_volume) >> 8;
            self.stereo_pos_r[i] = self.master_volume - self.stereo_pos_l[i];
        }
    }

    fn init_dac_tables(&mut self) {
        let mut max_sqr = 0;
        let mut max_tnd = 0;

        self.square_table = (0..32 * 16)
            .map(|i| {
                let mut value = 95.52 / (8128.0 / (f64::from(i) / 16.0) + 100.0);
                value *= 0.98411;
                value *= 50000.0;
                let ival = value.floor() as i32;
                max_sqr = max_sqr.max(ival);
                ival
            })
            .collect();

        self.tnd_table = (0..204 * 16)
            .map(|i| {
                let mut value = 163.67 / (24329.0 / (f64::from(i) / 16.0) + 100.0);
                value *= 0.98411;
                value *= 50000.0;
                let ival = value.floor() as i32;
                max_tnd = max_tnd.max(ival);
                ival
            })
            .collect();

        let dac_range = max_sqr + max_tnd;
        self.dc_value = dac_range / 2;
    }
}
