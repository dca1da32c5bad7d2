//! Unsplash photo catalog and image URL derivation.

/// Unsplash photo identifiers the daily background is picked from.
pub const PHOTO_IDS: &[&str] = &[
    "1506905925346-21bda4d32df4", // aerial photo of foggy mountains
    "1469474968028-56623f02e42e", // mountain hit by sun rays
    "1447752875215-b2761acb3c5d", // blue and brown steel bridge
    "1433086966358-54859d0ed716", // concrete bridge and waterfalls
    "1470071459604-3b5ec3a7fe05", // foggy mountain summit
    "1501785888041-af3ef285b470", // wooden boats on a blue lake
    "1472214103451-9374bd1c798e", // grass field at sunset
    "1464822759023-fed622ff2c3b", // green mountain across water
    "1767288832047-7d23f6c8c26c", // blue tit on a branch
    "1766859813732-20a127bb6023", // castle ruins above the fog
    "1766933366411-7a921aebe181", // peaks at golden hour
    "1765871319901-0aaafe3f1a2a", // misty forest valley
    "1765476608471-c30c09564def", // snowy mountains, starry sky
    "1764790355989-8ec00467f547", // canyon river at dusk
    "1737599136606-3bc63d4d3c52", // distant mountain range
    "1764014588235-d339ae275f19", // snowy mountains, pink sky
    "1761872936185-4ece7c1128ab", // crescent moon over peaks
    "1757918637010-214f0a48ee2d", // star trails over trees
    "1758351754305-fe00523aaefe", // peak emerging from fog
    "1484950763426-56b5bf172dbb", // off-road car silhouette
    "1756134904044-1cf7868cb9de", // mossy tree branches
    "1541753236788-b0ac1fc5009d", // snow-capped mountains
    "1542676032-6e468ada2953",    // white house near shore
    "1542856391-010fb87dcfed",    // boat on a lake
    "1754386341683-9d713eeda7ed", // lake under cloudy skies
    "1527086983597-b4d44c4a66d0", // suspension bridge
    "1731432245325-d820144afe4a", // snowy mountain, cloudy sky
    "1731351621470-8aebda14d242", // aerial city at night
];

/// Width and quality query parameters of the image URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    /// Requested width in pixels
    pub width: u32,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: 2560,
            quality: 90,
        }
    }
}

impl ImageOptions {
    /// Image URL for a photo identifier. Pure formatting, nothing is fetched.
    pub fn url(&self, photo_id: &str) -> String {
        format!(
            "https://images.unsplash.com/photo-{photo_id}?w={}&q={}",
            self.width, self.quality
        )
    }
}

/// Ordered set of photo identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    ids: Vec<String>,
}

impl Catalog {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// The built-in Unsplash catalog.
    pub fn builtin() -> Self {
        Self::new(PHOTO_IDS.iter().copied())
    }

    pub fn contains(&self, photo_id: &str) -> bool {
        self.ids.iter().any(|id| id == photo_id)
    }

    /// Every identifier except `current`.
    pub fn candidates(&self, current: Option<&str>) -> Vec<&str> {
        self.ids
            .iter()
            .map(String::as_str)
            .filter(|id| Some(*id) != current)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
