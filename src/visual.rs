use x11rb::protocol::xproto::{Depth, VisualClass, Visualtype};

/// Color depth of an alpha-capable true-color window.
pub const DEPTH_WITH_ALPHA: u8 = 32;

/// Find the first visual with the given depth and class.
pub fn find_visual(depths: &[Depth], depth: u8, class: VisualClass) -> Option<&Visualtype> {
    depths
        .iter()
        .filter(|d| d.depth == depth)
        .flat_map(|d| d.visuals.iter())
        .find(|v| v.class == class)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visual(id: u32, class: VisualClass) -> Visualtype {
        Visualtype {
            visual_id: id,
            class,
            bits_per_rgb_value: 8,
            colormap_entries: 256,
            red_mask: 0xff0000,
            green_mask: 0x00ff00,
            blue_mask: 0x0000ff,
        }
    }

    #[test]
    fn test_picks_first_matching_visual() {
        let depths = vec![
            Depth {
                depth: 24,
                visuals: vec![visual(0x21, VisualClass::TRUE_COLOR)],
            },
            Depth {
                depth: 32,
                visuals: vec![
                    visual(0x40, VisualClass::DIRECT_COLOR),
                    visual(0x41, VisualClass::TRUE_COLOR),
                    visual(0x42, VisualClass::TRUE_COLOR),
                ],
            },
        ];

        let found = find_visual(&depths, DEPTH_WITH_ALPHA, VisualClass::TRUE_COLOR).unwrap();
        assert_eq!(found.visual_id, 0x41);
    }

    #[test]
    fn test_no_alpha_depth() {
        let depths = vec![Depth {
            depth: 24,
            visuals: vec![visual(0x21, VisualClass::TRUE_COLOR)],
        }];
        assert!(find_visual(&depths, DEPTH_WITH_ALPHA, VisualClass::TRUE_COLOR).is_none());
    }
}
