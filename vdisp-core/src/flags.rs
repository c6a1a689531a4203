//! Bit flags shared between the platform adapter and the pipeline.

use bitflags::bitflags;

bitflags! {
    /// Creation flags for a virtual display.
    ///
    /// Bit positions match the platform display manager's constants so an
    /// adapter can pass [`DisplayFlags::bits`] straight through.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DisplayFlags: u32 {
        const PUBLIC = 1 << 0;
        const PRESENTATION = 1 << 1;
        const SECURE = 1 << 2;
        const OWN_CONTENT_ONLY = 1 << 3;
        const AUTO_MIRROR = 1 << 4;
        const SUPPORTS_TOUCH = 1 << 6;
        const ROTATES_WITH_CONTENT = 1 << 7;
        const DESTROY_CONTENT_ON_REMOVAL = 1 << 8;
        const SHOULD_SHOW_SYSTEM_DECORATIONS = 1 << 9;
        const TRUSTED = 1 << 10;
        const OWN_DISPLAY_GROUP = 1 << 11;
        const ALWAYS_UNLOCKED = 1 << 12;
        const TOUCH_FEEDBACK_DISABLED = 1 << 13;
        const OWN_FOCUS = 1 << 14;
        const DEVICE_DISPLAY_GROUP = 1 << 15;
    }
}

impl DisplayFlags {
    /// Flags used for streamed displays on a platform at `api_level`.
    pub fn for_api_level(api_level: u32) -> Self {
        let mut flags = Self::PUBLIC
            | Self::PRESENTATION
            | Self::OWN_CONTENT_ONLY
            | Self::SUPPORTS_TOUCH
            | Self::ROTATES_WITH_CONTENT
            | Self::DESTROY_CONTENT_ON_REMOVAL;

        if api_level >= 33 {
            flags |= Self::TRUSTED
                | Self::OWN_DISPLAY_GROUP
                | Self::ALWAYS_UNLOCKED
                | Self::TOUCH_FEEDBACK_DISABLED;
        }
        if api_level >= 34 {
            flags |= Self::OWN_FOCUS | Self::DEVICE_DISPLAY_GROUP;
        }
        flags
    }
}

bitflags! {
    /// Flags attached to an encoder output buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferFlags: u32 {
        const KEY_FRAME = 1 << 0;
        const CODEC_CONFIG = 1 << 1;
        const END_OF_STREAM = 1 << 2;
        const PARTIAL_FRAME = 1 << 3;
    }
}
