use chimera_common::HardwareEntropySeeds;
use serde::{Deserialize, Serialize};

/// Small-state deterministic RNG (splitmix32) used both server-side, to pick
/// calibrated fingerprint values, and inlined into the injected init script
/// so canvas/audio readouts are stable within a session but differ across
/// sessions (SPEC_FULL.md §4.4).
pub struct SmallStateRng {
    state: u32,
}

impl SmallStateRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed.wrapping_add(0x9E3779B9) }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x9E3779B9);
        let mut z = self.state;
        z = (z ^ (z >> 16)).wrapping_mul(0x21F0AAAD);
        z = (z ^ (z >> 15)).wrapping_mul(0x735A2D97);
        z ^ (z >> 15)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u32() as f64) / (u32::MAX as f64 + 1.0)
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let idx = (self.next_f64() * items.len() as f64) as usize;
        &items[idx.min(items.len() - 1)]
    }
}

/// WebGL {vendor, renderer} tuple drawn from a small calibrated list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WebGlProfile {
    pub vendor: &'static str,
    pub renderer: &'static str,
}

const WEBGL_PROFILES: &[WebGlProfile] = &[
    WebGlProfile { vendor: "Google Inc. (NVIDIA)", renderer: "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)" },
    WebGlProfile { vendor: "Google Inc. (Intel)", renderer: "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)" },
    WebGlProfile { vendor: "Google Inc. (AMD)", renderer: "ANGLE (AMD, AMD Radeon RX 580 Direct3D11 vs_5_0 ps_5_0, D3D11)" },
    WebGlProfile { vendor: "Apple Inc.", renderer: "Apple GPU" },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub platform: String,
    pub vendor: String,
    pub hardware_concurrency: u32,
    pub device_memory: u32,
    /// Default mobile touch-point count. `spec.md` §9 Open Questions notes
    /// the source has inconsistent values across files for this; `5` is
    /// the value this system standardizes on.
    pub max_touch_points: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerprintConfig {
    pub seeds: HardwareEntropySeeds,
    pub language: String,
    pub accept_languages: Vec<String>,
    pub timezone: String,
    pub pixel_ratio: f64,
    pub color_depth: u32,
    pub audio_noise_amplitude: f64,
    pub webgl: WebGlProfile,
    pub device: DeviceProfile,
    pub chrome_version: String,
}

impl FingerprintConfig {
    /// Derive a full configuration from three 31-bit seeds and the
    /// process-wide Chrome version/platform (`CHROME_UA_VERSION`,
    /// `CHROME_UA_PLATFORM`).
    pub fn derive(seeds: HardwareEntropySeeds, chrome_version: &str, chrome_platform: &str) -> Self {
        let mut rng = SmallStateRng::new(seeds.gpu);
        let webgl = *rng.choose(WEBGL_PROFILES);

        let audio_noise_amplitude = 0.0005 + rng.next_f64() * 0.0015;
        let pixel_ratio = *rng.choose(&[1.0_f64, 1.25, 1.5, 2.0]);
        let timezone = *rng.choose(&[
            "America/New_York",
            "America/Chicago",
            "America/Denver",
            "America/Los_Angeles",
        ]);

        let user_agent = format!(
            "Mozilla/5.0 ({chrome_platform}; {chrome_platform} x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/{chrome_version} Safari/537.36"
        );

        FingerprintConfig {
            seeds,
            language: "en-US".to_string(),
            accept_languages: vec!["en-US".to_string(), "en".to_string()],
            timezone: timezone.to_string(),
            pixel_ratio,
            color_depth: 24,
            audio_noise_amplitude,
            webgl,
            device: DeviceProfile {
                platform: chrome_platform.to_string(),
                vendor: "Google Inc.".to_string(),
                hardware_concurrency: *rng.choose(&[4u32, 8, 12, 16]),
                device_memory: *rng.choose(&[4u32, 8, 16]),
                max_touch_points: 5,
                viewport_width: 1920,
                viewport_height: 1080,
                user_agent,
            },
            chrome_version: chrome_version.to_string(),
        }
    }

    /// Render the single parameterized init-script template, substituting
    /// this session's seeds and configuration (SPEC_FULL.md §4.4, §9: "keep
    /// them as a single parameterized template file... substitute at apply
    /// time").
    pub fn render_init_script(&self) -> String {
        INIT_SCRIPT_TEMPLATE
            .replace("__GPU_SEED__", &self.seeds.gpu.to_string())
            .replace("__AUDIO_SEED__", &self.seeds.audio.to_string())
            .replace("__CANVAS_SEED__", &self.seeds.canvas.to_string())
            .replace("__AUDIO_NOISE__", &self.audio_noise_amplitude.to_string())
            .replace("__WEBGL_VENDOR__", self.webgl.vendor)
            .replace("__WEBGL_RENDERER__", self.webgl.renderer)
            .replace("__PLATFORM__", &self.device.platform)
            .replace("__VENDOR__", &self.device.vendor)
            .replace(
                "__HARDWARE_CONCURRENCY__",
                &self.device.hardware_concurrency.to_string(),
            )
            .replace("__DEVICE_MEMORY__", &self.device.device_memory.to_string())
            .replace("__MAX_TOUCH_POINTS__", &self.device.max_touch_points.to_string())
            .replace("__LANGUAGES__", &format!("{:?}", self.accept_languages))
            .replace("__LANGUAGE__", &self.language)
            .replace("__COLOR_DEPTH__", &self.color_depth.to_string())
            .replace("__PIXEL_RATIO__", &self.pixel_ratio.to_string())
            .replace("__CHROME_VERSION__", &self.chrome_version)
    }
}

/// Stealth patch set, applied via `Page.evaluateOnNewDocument` before any
/// site code runs. Enforces the invariants in SPEC_FULL.md §4.4: webdriver
/// hidden, frozen navigator surface, spoofed WebGL/canvas/audio readouts,
/// neutralized WebRTC leak, aliased frame parent/top.
const INIT_SCRIPT_TEMPLATE: &str = r#"
(() => {
  function splitmix32(seed) {
    let state = (seed + 0x9E3779B9) >>> 0;
    return function () {
      state = (state + 0x9E3779B9) >>> 0;
      let z = state;
      z = Math.imul(z ^ (z >>> 16), 0x21F0AAAD) >>> 0;
      z = Math.imul(z ^ (z >>> 15), 0x735A2D97) >>> 0;
      return ((z ^ (z >>> 15)) >>> 0) / 4294967296;
    };
  }
  const gpuRand = splitmix32(__GPU_SEED__);
  const audioRand = splitmix32(__AUDIO_SEED__);
  const canvasRand = splitmix32(__CANVAS_SEED__);

  Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: false });

  const overrides = {
    platform: '__PLATFORM__',
    vendor: '__VENDOR__',
    hardwareConcurrency: __HARDWARE_CONCURRENCY__,
    deviceMemory: __DEVICE_MEMORY__,
    maxTouchPoints: __MAX_TOUCH_POINTS__,
    languages: __LANGUAGES__,
    language: '__LANGUAGE__',
  };
  for (const [key, value] of Object.entries(overrides)) {
    Object.defineProperty(navigator, key, { get: () => value, configurable: false });
  }
  Object.defineProperty(navigator, 'plugins', {
    get: () => [{ name: 'Chrome PDF Plugin' }, { name: 'Chrome PDF Viewer' }, { name: 'Native Client' }],
    configurable: false,
  });

  window.chrome = window.chrome || { runtime: {}, loadTimes: () => ({}), csi: () => ({}) };

  const originalQuery = window.navigator.permissions.query;
  window.navigator.permissions.query = (params) =>
    params.name === 'notifications'
      ? Promise.resolve({ state: Notification.permission })
      : originalQuery(params);

  const getParameterProto = WebGLRenderingContext.prototype.getParameter;
  function patchedGetParameter(param) {
    if (param === 0x9245) return '__WEBGL_VENDOR__';
    if (param === 0x9246) return '__WEBGL_RENDERER__';
    return getParameterProto.call(this, param);
  }
  WebGLRenderingContext.prototype.getParameter = patchedGetParameter;
  if (window.WebGL2RenderingContext) {
    WebGL2RenderingContext.prototype.getParameter = patchedGetParameter;
  }

  const origToDataURL = HTMLCanvasElement.prototype.toDataURL;
  HTMLCanvasElement.prototype.toDataURL = function (type, ...args) {
    if (type === 'image/png' && this.width > 16 && this.height > 16) {
      const ctx = this.getContext('2d');
      if (ctx) {
        const imageData = ctx.getImageData(0, 0, this.width, this.height);
        for (let i = 0; i < imageData.data.length; i += 4) {
          const delta = canvasRand() < 0.5 ? -1 : 1;
          imageData.data[i] = Math.min(255, Math.max(0, imageData.data[i] + delta));
        }
        ctx.putImageData(imageData, 0, 0);
      }
    }
    return origToDataURL.call(this, type, ...args);
  };

  const origGetFloatFrequencyData = AnalyserNode.prototype.getFloatFrequencyData;
  AnalyserNode.prototype.getFloatFrequencyData = function (array) {
    origGetFloatFrequencyData.call(this, array);
    for (let i = 0; i < array.length; i++) {
      array[i] += (audioRand() - 0.5) * __AUDIO_NOISE__;
    }
  };

  Object.defineProperty(navigator, 'connection', {
    get: () => ({ effectiveType: '4g', rtt: 50 + Math.floor(gpuRand() * 20), downlink: 8 + gpuRand() * 2 }),
    configurable: false,
  });

  navigator.getBattery = () => Promise.resolve({ charging: true, level: 1.0 });

  Object.defineProperty(screen, 'colorDepth', { get: () => __COLOR_DEPTH__ });
  Object.defineProperty(screen, 'pixelDepth', { get: () => __COLOR_DEPTH__ });
  Object.defineProperty(window, 'devicePixelRatio', { get: () => __PIXEL_RATIO__ });

  if (navigator.userAgentData) {
    const originalGetHighEntropy = navigator.userAgentData.getHighEntropyValues.bind(navigator.userAgentData);
    navigator.userAgentData.getHighEntropyValues = (hints) =>
      originalGetHighEntropy(hints).then((values) => ({
        ...values,
        platform: '__PLATFORM__',
        uaFullVersion: '__CHROME_VERSION__',
      }));
  }

  if (window.RTCPeerConnection) {
    const originalCreateDataChannel = RTCPeerConnection.prototype.createDataChannel;
    RTCPeerConnection.prototype.createDataChannel = function (...args) {
      return originalCreateDataChannel.apply(this, args);
    };
    delete window.RTCPeerConnection;
  }

  try {
    Object.defineProperty(window, 'parent', { get: () => window });
    Object.defineProperty(window, 'top', { get: () => window });
  } catch (e) {
    // some frames define these as non-configurable; leave as-is
  }
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds(gpu: u32, audio: u32, canvas: u32) -> HardwareEntropySeeds {
        HardwareEntropySeeds { gpu, audio, canvas }
    }

    #[test]
    fn same_seed_yields_same_config() {
        let a = FingerprintConfig::derive(seeds(1, 2, 3), "124.0.0.0", "Win32");
        let b = FingerprintConfig::derive(seeds(1, 2, 3), "124.0.0.0", "Win32");
        assert_eq!(a.webgl.vendor, b.webgl.vendor);
        assert_eq!(a.timezone, b.timezone);
        assert_eq!(a.device.hardware_concurrency, b.device.hardware_concurrency);
    }

    #[test]
    fn different_seed_can_yield_different_config() {
        let configs: Vec<_> = (0..20)
            .map(|i| FingerprintConfig::derive(seeds(i, i + 1, i + 2), "124.0.0.0", "Win32"))
            .collect();
        let distinct_timezones = configs
            .iter()
            .map(|c| c.timezone.clone())
            .collect::<std::collections::HashSet<_>>()
            .len();
        assert!(distinct_timezones > 1);
    }

    #[test]
    fn init_script_has_no_leftover_placeholders() {
        let cfg = FingerprintConfig::derive(seeds(7, 8, 9), "124.0.0.0", "Win32");
        let script = cfg.render_init_script();
        assert!(!script.contains("__"), "unsubstituted placeholder remained");
    }

    #[test]
    fn max_touch_points_defaults_to_five() {
        let cfg = FingerprintConfig::derive(seeds(1, 1, 1), "124.0.0.0", "Win32");
        assert_eq!(cfg.device.max_touch_points, 5);
    }
}
